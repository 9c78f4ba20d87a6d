use std::time::Instant;

use parking_lot::Mutex;
use rigwatch_core::{CheckError, Checker, CollectError, Collector};
use rigwatch_core::model::{CheckerResult, Level};
use rigwatch_core::Snapshot;
use serde::Deserialize;
use sysinfo::System;

/// Host memory utilization as a fraction in `[0, 1]` (spec §2 "memory").
#[derive(Debug, Clone, Copy)]
pub struct MemorySnapshot {
    pub used_fraction: f64,
    pub total_bytes: u64,
}

pub struct MemoryCollector {
    system: Mutex<System>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_all()),
        }
    }
}

impl Default for MemoryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for MemoryCollector {
    type Output = MemorySnapshot;

    fn subsystem(&self) -> &'static str {
        "memory"
    }

    async fn collect(&self, _deadline: Instant) -> Result<MemorySnapshot, CollectError> {
        let mut system = self.system.lock();
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return Err(CollectError::SubsystemAbsent { subsystem: "memory" });
        }
        let used = system.used_memory();
        Ok(MemorySnapshot {
            used_fraction: used as f64 / total as f64,
            total_bytes: total,
        })
    }
}

/// `memory` subsystem fragment narrowed from the cluster spec (spec §3
/// "Spec"): the utilization threshold above which the checker reports
/// abnormal.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryFragment {
    #[serde(default = "default_threshold")]
    pub max_used_fraction: f64,
}

fn default_threshold() -> f64 {
    0.9
}

impl Default for MemoryFragment {
    fn default() -> Self {
        Self {
            max_used_fraction: default_threshold(),
        }
    }
}

pub struct MemoryChecker {
    threshold: f64,
}

impl MemoryChecker {
    pub fn new(fragment: MemoryFragment) -> Self {
        Self {
            threshold: fragment.max_used_fraction,
        }
    }
}

impl Checker<MemorySnapshot> for MemoryChecker {
    fn name(&self) -> &str {
        "memory_utilization"
    }

    fn check(&self, snapshot: &Snapshot<MemorySnapshot>) -> Result<CheckerResult, CheckError> {
        let used = snapshot.value.used_fraction;
        if used > self.threshold {
            let mut result = CheckerResult::abnormal(
                self.name(),
                Level::Warning,
                format!("memory utilization {:.1}% exceeds threshold {:.1}%", used * 100.0, self.threshold * 100.0),
            );
            result.spec_value = Some(format!("{:.2}", self.threshold));
            result.current_value = Some(format!("{:.2}", used));
            return Ok(result);
        }
        Ok(CheckerResult::normal(self.name()))
    }
}
