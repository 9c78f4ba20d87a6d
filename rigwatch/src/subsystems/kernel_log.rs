use std::sync::Arc;
use std::time::Instant;

use rigwatch_core::model::CheckerResult;
use rigwatch_core::{CheckError, Checker, CollectError, Collector, EventFilter, Matched, Snapshot};

/// An Event-Filter-backed collector/checker pair that tails a kernel-ring-
/// buffer-like log for OOM/Xid/MCE-style patterns (spec §2 "kernel_log",
/// exercised by Testable Property S1).
pub struct KernelLogCollector {
    filter: Arc<EventFilter>,
}

impl KernelLogCollector {
    pub fn new(filter: Arc<EventFilter>) -> Self {
        Self { filter }
    }
}

impl Collector for KernelLogCollector {
    type Output = Vec<Matched>;

    fn subsystem(&self) -> &'static str {
        "kernel_log"
    }

    async fn collect(&self, _deadline: Instant) -> Result<Vec<Matched>, CollectError> {
        Ok(self.filter.check())
    }
}

/// One abnormal [`CheckerResult`] per distinct matched rule name, `current =
/// "<n>"` where `n` is the number of matches this tick — matching Testable
/// Property S1's "one abnormal CheckerResult named `<rule>` with `current =
/// \"1\"`" for a single matching line.
pub struct KernelLogChecker;

impl Checker<Vec<Matched>> for KernelLogChecker {
    fn name(&self) -> &str {
        "kernel_log"
    }

    fn check(&self, snapshot: &Snapshot<Vec<Matched>>) -> Result<CheckerResult, CheckError> {
        let Some(first) = snapshot.value.first() else {
            return Ok(CheckerResult::normal("kernel_log"));
        };
        let count = snapshot.value.iter().filter(|m| m.rule_name == first.rule_name).count();
        let mut result = CheckerResult::abnormal(first.rule_name.clone(), first.level, first.line.clone());
        result.current_value = Some(count.to_string());
        result.spec_value = Some("0".to_string());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rigwatch_core::model::Level;

    fn matched(rule: &str) -> Matched {
        Matched {
            rule_name: rule.to_string(),
            pattern: "Out of memory".to_string(),
            source_name: "kern.log".to_string(),
            line: "Out of memory: Kill process 1234".to_string(),
            level: Level::Critical,
        }
    }

    #[test]
    fn no_matches_is_normal() {
        let checker = KernelLogChecker;
        let snapshot = Snapshot::new(Vec::new(), Utc::now());
        assert!(!checker.check(&snapshot).unwrap().is_abnormal());
    }

    #[test]
    fn one_match_reports_current_value_one() {
        let checker = KernelLogChecker;
        let snapshot = Snapshot::new(vec![matched("oom")], Utc::now());
        let result = checker.check(&snapshot).unwrap();
        assert!(result.is_abnormal());
        assert_eq!(result.name, "oom");
        assert_eq!(result.current_value.as_deref(), Some("1"));
    }
}
