use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;

/// Process-wide (but explicit, non-`static`) registry mapping component name
/// to query interval (spec §4.E).
///
/// `get`/`set` are atomic per-key via [`DashMap`]'s sharded locking — no
/// global lock is required, matching spec §5's "per-key atomic stores; no
/// global lock" resource note. Setting an interval also broadcasts a
/// `(name, interval)` notification so the affected [`crate::service::CommonService`]
/// recomputes its next deadline no later than its next tick decision.
///
/// Per spec §9 ("process-wide singletons... are modeled as explicit
/// services"), this is constructed once in daemon startup and passed down as
/// an `Arc`, not a `static`; tests construct a fresh instance.
pub struct FreqController {
    intervals: DashMap<String, Duration>,
    changes: broadcast::Sender<(String, Duration)>,
}

impl FreqController {
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(256);
        Self {
            intervals: DashMap::new(),
            changes,
        }
    }

    /// Registers `name` with its initial interval if not already present.
    pub fn register(&self, name: &str, initial: Duration) {
        self.intervals.entry(name.to_string()).or_insert(initial);
    }

    /// Unknown names are created on first `set`, per spec §4.E, so a
    /// not-yet-started component can still receive an override.
    pub fn set(&self, name: &str, interval: Duration) {
        self.intervals.insert(name.to_string(), interval);
        let _ = self.changes.send((name.to_string(), interval));
    }

    pub fn get(&self, name: &str) -> Option<Duration> {
        self.intervals.get(name).map(|entry| *entry.value())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(String, Duration)> {
        self.changes.subscribe()
    }
}

impl Default for FreqController {
    fn default() -> Self {
        Self::new()
    }
}
