use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::checker::Checker;
use crate::error::CheckError;
use crate::freq::FreqController;
use crate::model::{CheckerResult, Level};
use crate::snapshot::Snapshot;

/// One device's sample for one indicator (spec §4.H inputs).
#[derive(Debug, Clone, Copy)]
pub struct IndicatorSample {
    pub value: f64,
    pub last_update: DateTime<Utc>,
}

/// `{device-id -> {indicator-name -> sample}}`, the Hang Detector's snapshot type.
pub type DeviceIndicatorSnapshot = HashMap<String, HashMap<String, IndicatorSample>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Gt,
    Eq,
}

impl Comparator {
    fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Lt => value < threshold,
            Comparator::Gt => value > threshold,
            Comparator::Eq => value == threshold,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IndicatorRule {
    pub threshold: f64,
    pub comparator: Comparator,
}

/// Looks up the workload occupying a device, for device→workload
/// attribution (spec §4.H). Shipped as a trait so the core does not depend
/// on a concrete orchestrator client.
pub trait WorkloadLookup: Send + Sync {
    fn lookup(&self, device_id: &str) -> Option<WorkloadInfo>;
}

#[derive(Debug, Clone)]
pub struct WorkloadInfo {
    pub workload_id: String,
    pub namespace: String,
}

/// No workload information available; every hanging device is reported
/// undecorated at full severity.
pub struct NoWorkloadLookup;
impl WorkloadLookup for NoWorkloadLookup {
    fn lookup(&self, _device_id: &str) -> Option<WorkloadInfo> {
        None
    }
}

pub struct HangRule {
    pub indicators: HashMap<String, IndicatorRule>,
    pub duration_threshold: Duration,
    pub query_interval_after_abnormal: Duration,
    pub abnormal_detected_times: u32,
    pub ignore_namespaces: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
struct IndicatorState {
    active: bool,
    last_value: f64,
    accumulated: Duration,
    prior_timestamp: Option<DateTime<Utc>>,
}

impl IndicatorState {
    fn observe(&mut self, sample: IndicatorSample, rule: &IndicatorRule) {
        let holds = rule.comparator.holds(sample.value, rule.threshold);
        if holds {
            if let Some(prior) = self.prior_timestamp {
                if let Ok(delta) = (sample.last_update - prior).to_std() {
                    self.accumulated += delta;
                }
            }
            self.active = true;
            self.prior_timestamp = Some(sample.last_update);
        } else {
            self.accumulated = Duration::ZERO;
            self.active = false;
            self.prior_timestamp = None;
        }
        self.last_value = sample.value;
    }
}

/// Suspicion state machine (spec §4.H). Persists across ticks on the
/// `HangChecker` instance; reset when the owning Component stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Suspicion {
    Normal,
    Suspected { counter: u32 },
}

/// A specialized, stateful Checker for GPU/device hang detection (spec
/// §4.H). Must not be shared across Components — each Component gets its
/// own instance, mirroring the spec's "state machine state... must not be
/// shared" constraint inherited from §4.C.
pub struct HangChecker {
    name: String,
    rule: HangRule,
    workload_lookup: Arc<dyn WorkloadLookup>,
    freq: Arc<FreqController>,
    self_component: String,
    gpu_component: String,
    indicator_state: Mutex<HashMap<(String, String), IndicatorState>>,
    suspicion: Mutex<Suspicion>,
    saved_intervals: Mutex<Option<(Duration, Duration)>>,
}

impl HangChecker {
    pub fn new(
        name: impl Into<String>,
        rule: HangRule,
        workload_lookup: Arc<dyn WorkloadLookup>,
        freq: Arc<FreqController>,
        self_component: impl Into<String>,
        gpu_component: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            rule,
            workload_lookup,
            freq,
            self_component: self_component.into(),
            gpu_component: gpu_component.into(),
            indicator_state: Mutex::new(HashMap::new()),
            suspicion: Mutex::new(Suspicion::Normal),
            saved_intervals: Mutex::new(None),
        }
    }

    /// Resets all per-tick state; called when the owning Component stops
    /// (spec §4.H: "state machine state... is reset when the Component is
    /// stopped").
    pub fn reset(&self) {
        self.indicator_state.lock().clear();
        *self.suspicion.lock() = Suspicion::Normal;
        *self.saved_intervals.lock() = None;
    }

    fn device_is_hanging(&self, device: &str, indicators: &HashMap<String, IndicatorSample>) -> bool {
        let mut state = self.indicator_state.lock();
        let mut all_met = true;
        for (indicator_name, rule) in &self.rule.indicators {
            let key = (device.to_string(), indicator_name.clone());
            let entry = state.entry(key).or_default();
            match indicators.get(indicator_name) {
                Some(sample) => entry.observe(*sample, rule),
                None => {
                    entry.accumulated = Duration::ZERO;
                    entry.active = false;
                    entry.prior_timestamp = None;
                }
            }
            if entry.accumulated < self.rule.duration_threshold {
                all_met = false;
            }
        }
        all_met
    }
}

impl Checker<DeviceIndicatorSnapshot> for HangChecker {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, snapshot: &Snapshot<DeviceIndicatorSnapshot>) -> Result<CheckerResult, CheckError> {
        let mut hanging_devices = Vec::new();
        for (device, indicators) in snapshot.value.iter() {
            if self.device_is_hanging(device, indicators) {
                hanging_devices.push(device.clone());
            }
        }
        let any_hanging = !hanging_devices.is_empty();

        let mut suspicion = self.suspicion.lock();
        let (confirmed, next) = match *suspicion {
            Suspicion::Normal if any_hanging => {
                let mut saved = self.saved_intervals.lock();
                if saved.is_none() {
                    let self_interval = self
                        .freq
                        .get(&self.self_component)
                        .unwrap_or(self.rule.query_interval_after_abnormal);
                    let gpu_interval = self
                        .freq
                        .get(&self.gpu_component)
                        .unwrap_or(self.rule.query_interval_after_abnormal);
                    *saved = Some((self_interval, gpu_interval));
                    self.freq.set(&self.self_component, self.rule.query_interval_after_abnormal);
                    self.freq.set(&self.gpu_component, self.rule.query_interval_after_abnormal);
                }
                (false, Suspicion::Suspected { counter: 1 })
            }
            Suspicion::Normal => (false, Suspicion::Normal),
            Suspicion::Suspected { counter } if any_hanging => {
                let counter = counter + 1;
                if counter >= self.rule.abnormal_detected_times {
                    (true, Suspicion::Suspected { counter })
                } else {
                    (false, Suspicion::Suspected { counter })
                }
            }
            Suspicion::Suspected { .. } => {
                if let Some((self_interval, gpu_interval)) = self.saved_intervals.lock().take() {
                    self.freq.set(&self.self_component, self_interval);
                    self.freq.set(&self.gpu_component, gpu_interval);
                }
                (false, Suspicion::Normal)
            }
        };
        *suspicion = next;
        drop(suspicion);

        if !confirmed {
            return Ok(CheckerResult::normal(&self.name));
        }

        let mut decorated = Vec::new();
        let mut all_ignored = true;
        for device in &hanging_devices {
            match self.workload_lookup.lookup(device) {
                Some(info) => {
                    if !self.rule.ignore_namespaces.contains(&info.namespace) {
                        all_ignored = false;
                    }
                    decorated.push(format!("{device}({})", info.workload_id));
                }
                None => {
                    all_ignored = false;
                    decorated.push(device.clone());
                }
            }
        }
        let level = if all_ignored { Level::Info } else { Level::Critical };

        let detail = format!("device hang confirmed: {}", decorated.join(","));
        let mut result = CheckerResult::abnormal(&self.name, level, detail);
        result.device = Some(decorated.join(","));
        Ok(result)
    }
}
