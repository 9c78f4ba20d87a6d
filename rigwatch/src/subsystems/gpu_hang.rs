use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::Utc;
use rigwatch_core::hang::{DeviceIndicatorSnapshot, IndicatorSample};
use rigwatch_core::{CollectError, Collector};

/// A fixture-driven device-indicator source standing in for vendor NVML
/// bindings (spec §2 "gpu_hang"). Reads a fixed table of `(device,
/// indicator) -> value` pairs supplied at construction, re-stamping the
/// timestamp on every tick; a real binding would poll hardware registers
/// instead of replaying fixture values.
pub struct FixtureGpuHangCollector {
    devices: Vec<String>,
    indicator: String,
    fixture_values: Vec<f64>,
    tick: AtomicU64,
}

impl FixtureGpuHangCollector {
    pub fn new(devices: Vec<String>, indicator: impl Into<String>, fixture_values: Vec<f64>) -> Self {
        assert!(!fixture_values.is_empty(), "fixture_values must not be empty");
        Self {
            devices,
            indicator: indicator.into(),
            fixture_values,
            tick: AtomicU64::new(0),
        }
    }

    /// A collector that reports the same indicator value every tick, the
    /// common case of "all devices are wedged at this SM-occupancy value".
    pub fn constant(devices: Vec<String>, indicator: impl Into<String>, value: f64) -> Self {
        Self::new(devices, indicator, vec![value])
    }
}

impl Collector for FixtureGpuHangCollector {
    type Output = DeviceIndicatorSnapshot;

    fn subsystem(&self) -> &'static str {
        "gpu_hang"
    }

    async fn collect(&self, _deadline: Instant) -> Result<DeviceIndicatorSnapshot, CollectError> {
        let tick = self.tick.fetch_add(1, Ordering::SeqCst) as usize;
        let value = self.fixture_values[tick % self.fixture_values.len()];
        let now = Utc::now();
        let sample = IndicatorSample {
            value,
            last_update: now,
        };
        let mut snapshot = DeviceIndicatorSnapshot::new();
        for device in &self.devices {
            let mut indicators = HashMap::new();
            indicators.insert(self.indicator.clone(), sample);
            snapshot.insert(device.clone(), indicators);
        }
        Ok(snapshot)
    }
}
