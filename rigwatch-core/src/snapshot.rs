use chrono::{DateTime, Utc};

/// An opaque-to-the-framework, strongly-typed value produced by a Collector,
/// carrying the wall-clock timestamp at which it was produced (spec §3
/// "Snapshot (Info)"). A Component's snapshots are totally ordered by
/// `timestamp`.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub value: T,
    pub timestamp: DateTime<Utc>,
}

impl<T> Snapshot<T> {
    pub fn new(value: T, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }

    pub fn now(value: T) -> Self {
        Self::new(value, Utc::now())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Snapshot<U> {
        Snapshot {
            value: f(self.value),
            timestamp: self.timestamp,
        }
    }

    /// Per spec §4.B: "reused snapshots are rejected when their timestamp is
    /// <= the caller's prior observation."
    pub fn is_fresher_than(&self, prior: DateTime<Utc>) -> bool {
        self.timestamp > prior
    }
}
