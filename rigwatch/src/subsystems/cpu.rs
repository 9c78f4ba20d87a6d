use std::time::Instant;

use parking_lot::Mutex;
use rigwatch_core::model::{CheckerResult, Level};
use rigwatch_core::{CheckError, Checker, CollectError, Collector, Snapshot};
use serde::Deserialize;
use sysinfo::System;

/// Per-core count and one-minute load average (spec §2 "cpu").
#[derive(Debug, Clone, Copy)]
pub struct CpuSnapshot {
    pub core_count: usize,
    pub load_avg_one_minute: f64,
}

pub struct CpuCollector {
    system: Mutex<System>,
}

impl CpuCollector {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_all()),
        }
    }
}

impl Default for CpuCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for CpuCollector {
    type Output = CpuSnapshot;

    fn subsystem(&self) -> &'static str {
        "cpu"
    }

    async fn collect(&self, _deadline: Instant) -> Result<CpuSnapshot, CollectError> {
        let mut system = self.system.lock();
        system.refresh_cpu_all();
        let core_count = system.cpus().len();
        if core_count == 0 {
            return Err(CollectError::SubsystemAbsent { subsystem: "cpu" });
        }
        Ok(CpuSnapshot {
            core_count,
            load_avg_one_minute: System::load_average().one,
        })
    }
}

/// `cpu` subsystem fragment: max tolerated load average per core (spec §3).
#[derive(Debug, Clone, Deserialize)]
pub struct CpuFragment {
    #[serde(default = "default_max_load_per_core")]
    pub max_load_per_core: f64,
}

fn default_max_load_per_core() -> f64 {
    1.0
}

impl Default for CpuFragment {
    fn default() -> Self {
        Self {
            max_load_per_core: default_max_load_per_core(),
        }
    }
}

pub struct CpuChecker {
    max_load_per_core: f64,
}

impl CpuChecker {
    pub fn new(fragment: CpuFragment) -> Self {
        Self {
            max_load_per_core: fragment.max_load_per_core,
        }
    }
}

impl Checker<CpuSnapshot> for CpuChecker {
    fn name(&self) -> &str {
        "cpu_load"
    }

    fn check(&self, snapshot: &Snapshot<CpuSnapshot>) -> Result<CheckerResult, CheckError> {
        let CpuSnapshot {
            core_count,
            load_avg_one_minute,
        } = snapshot.value;
        let budget = self.max_load_per_core * core_count as f64;
        if load_avg_one_minute > budget {
            let mut result = CheckerResult::abnormal(
                self.name(),
                Level::Warning,
                format!("1m load average {load_avg_one_minute:.2} exceeds budget {budget:.2} for {core_count} cores"),
            );
            result.spec_value = Some(format!("{budget:.2}"));
            result.current_value = Some(format!("{load_avg_one_minute:.2}"));
            return Ok(result);
        }
        Ok(CheckerResult::normal(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(core_count: usize, load: f64) -> Snapshot<CpuSnapshot> {
        Snapshot::new(
            CpuSnapshot {
                core_count,
                load_avg_one_minute: load,
            },
            Utc::now(),
        )
    }

    #[test]
    fn load_within_per_core_budget_is_normal() {
        let checker = CpuChecker::new(CpuFragment { max_load_per_core: 1.0 });
        let result = checker.check(&snapshot(4, 3.0)).unwrap();
        assert!(!result.is_abnormal());
    }

    #[test]
    fn load_over_per_core_budget_is_abnormal() {
        let checker = CpuChecker::new(CpuFragment { max_load_per_core: 1.0 });
        let result = checker.check(&snapshot(4, 5.0)).unwrap();
        assert!(result.is_abnormal());
    }
}
