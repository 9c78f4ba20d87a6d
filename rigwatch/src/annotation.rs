use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

/// Writes a node annotation (spec §4.G item 4). The core depends only on
/// this trait, never on a concrete orchestrator client — the same seam
/// shape as the teacher's `StartupHooks`/`MediaDatabaseTrait` integration
/// points.
pub trait AnnotationSink: Send + Sync {
    fn write(&self, key: &str, error_names: &HashMap<String, Vec<String>>);
}

/// Sends a readiness notification once, after the first successful
/// aggregation pass (spec §4.G item 5).
pub trait ReadinessNotifier: Send + Sync {
    fn notify_ready(&self);
}

/// Logs what would be written instead of calling an orchestrator API.
/// Ships as the default sink; a real cluster deployment swaps in a client
/// for its orchestrator of choice at the same seam.
pub struct LoggingAnnotationSink {
    last_written: Mutex<Option<String>>,
}

impl LoggingAnnotationSink {
    pub fn new() -> Self {
        Self {
            last_written: Mutex::new(None),
        }
    }
}

impl Default for LoggingAnnotationSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationSink for LoggingAnnotationSink {
    /// Coalesces identical consecutive payloads (spec §4.G item 4: "at most
    /// one write in flight per key; subsequent updates supersede pending
    /// writes") — here, as a single-slot "only write if changed" gate, since
    /// the logging sink has no in-flight network call to cancel.
    fn write(&self, key: &str, error_names: &HashMap<String, Vec<String>>) {
        let payload = serde_json::to_string(error_names).unwrap_or_default();
        let mut last = self.last_written.lock();
        if last.as_deref() == Some(payload.as_str()) {
            return;
        }
        info!(annotation_key = key, payload = %payload, "would write node annotation");
        *last = Some(payload);
    }
}

pub struct LoggingReadinessNotifier {
    notified: Mutex<bool>,
}

impl LoggingReadinessNotifier {
    pub fn new() -> Self {
        Self {
            notified: Mutex::new(false),
        }
    }
}

impl Default for LoggingReadinessNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessNotifier for LoggingReadinessNotifier {
    fn notify_ready(&self) {
        let mut notified = self.notified.lock();
        if *notified {
            return;
        }
        info!("daemon ready (systemd sd_notify is a no-op in this build)");
        *notified = true;
    }
}

/// Drives the annotation/readiness seam from the Daemon Service's verdict
/// map: called after each aggregation update (spec §4.G items 4-5).
pub struct AnnotationDriver {
    key: String,
    sink: Arc<dyn AnnotationSink>,
    readiness: Arc<dyn ReadinessNotifier>,
}

impl AnnotationDriver {
    pub fn new(key: String, sink: Arc<dyn AnnotationSink>, readiness: Arc<dyn ReadinessNotifier>) -> Self {
        Self { key, sink, readiness }
    }

    pub fn on_aggregation_update(&self, error_names: HashMap<String, Vec<String>>) {
        self.sink.write(&self.key, &error_names);
        self.readiness.notify_ready();
    }
}
