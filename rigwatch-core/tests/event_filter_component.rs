use std::sync::Arc;
use std::time::{Duration, Instant};

use rigwatch_core::error::{CheckError, CollectError};
use rigwatch_core::model::{CheckerResult, EventRule, Level, Source, UserConfig};
use rigwatch_core::snapshot::Snapshot;
use rigwatch_core::{Checker, Collector, Component, EventFilter, FileRegistry, Matched};

struct KernelLogCollector {
    filter: Arc<EventFilter>,
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

struct OomChecker;
impl Checker<Vec<Matched>> for OomChecker {
    fn name(&self) -> &str {
        "oom"
    }

    fn check(&self, snapshot: &Snapshot<Vec<Matched>>) -> Result<CheckerResult, CheckError> {
        let count = snapshot.value.iter().filter(|m| m.rule_name == "oom").count();
        if count == 0 {
            return Ok(CheckerResult::normal("oom"));
        }
        let mut result = CheckerResult::abnormal("oom", Level::Critical, "Out of memory detected");
        result.current_value = Some(count.to_string());
        Ok(result)
    }
}

/// S1 (happy path, event filter): one matching line appended after startup
/// produces exactly one abnormal CheckerResult named "oom" with `current = "1"`.
#[tokio::test]
async fn single_matching_line_produces_one_abnormal_result_with_current_one() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("kern.log");
    std::fs::write(&log_path, "boot ok\n").unwrap();

    let rule = EventRule {
        name: "oom".to_string(),
        description: None,
        source: Source::LogFile(log_path.clone()),
        regexp: "Out of memory".to_string(),
        level: Level::Critical,
    };
    let registry = Arc::new(FileRegistry::new());
    let filter = Arc::new(EventFilter::new(vec![rule], registry, dir.path().to_path_buf(), 0, 16).unwrap());

    let component = Component::build(
        "kernel_log",
        KernelLogCollector { filter },
        vec![Box::new(OomChecker)],
        UserConfig::default(),
    )
    .unwrap();

    // Startup tick: no match yet.
    let startup = component.health_check(Instant::now() + Duration::from_secs(1)).await.unwrap().unwrap();
    assert!(!startup.is_abnormal());

    let mut f = std::fs::OpenOptions::new().append(true).open(&log_path).unwrap();
    use std::io::Write;
    writeln!(f, "Out of memory: Kill process 1234 (stress)").unwrap();

    let result = component.health_check(Instant::now() + Duration::from_secs(1)).await.unwrap().unwrap();
    assert!(result.is_abnormal());
    assert_eq!(result.checkers.len(), 1);
    assert_eq!(result.checkers[0].name, "oom");
    assert_eq!(result.checkers[0].current_value.as_deref(), Some("1"));
}
