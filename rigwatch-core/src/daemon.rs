use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::warn;

use crate::model::{HealthResult, Level, Status};

/// Node-level rollup of every Component's latest Result (spec §4.G item 2).
#[derive(Debug, Clone)]
pub struct Summary {
    pub overall_status: Status,
    pub overall_level: Option<Level>,
    pub components: Vec<HealthResult>,
}

/// Aggregates per-Component result streams into an in-memory "current
/// verdict" map and folds it into a node-level [`Summary`] on demand (spec
/// §4.G items 1-2).
///
/// Item 3 (HTTP/Unix-socket surface), item 4 (orchestrator annotation), item
/// 5 (systemd readiness), and item 6 (signal handling) are external-
/// collaborator seams per spec.md §1 and are composed on top of this type by
/// the `rigwatch` binary, not implemented here.
pub struct DaemonService {
    verdicts: DashMap<String, HealthResult>,
}

impl DaemonService {
    pub fn new() -> Self {
        Self {
            verdicts: DashMap::new(),
        }
    }

    /// Folds one arrival into the current-verdict map. Exposed directly so
    /// callers composing their own aggregation loop (e.g. to drive an
    /// annotation write per update, spec §4.G item 4) don't have to
    /// reimplement the verdict map.
    pub fn record(&self, component_name: String, result: HealthResult) {
        self.verdicts.insert(component_name, result);
    }

    /// Subscribes to one Component's result stream and spawns a task that
    /// folds each arrival into the current-verdict map. Returns the task's
    /// join handle so callers can await it during shutdown.
    pub fn aggregate(self: &Arc<Self>, component_name: String, mut results: broadcast::Receiver<HealthResult>) -> tokio::task::JoinHandle<()> {
        let daemon = self.clone();
        tokio::spawn(async move {
            loop {
                match results.recv().await {
                    Ok(result) => {
                        daemon.record(component_name.clone(), result);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(component = %component_name, skipped, "daemon aggregation lagged; verdict may be stale");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Folds the current verdict map into a node-level summary (spec §4.G
    /// item 2). Components that have not reported yet are simply absent —
    /// callers needing readiness must check the component count themselves
    /// (see `rigwatch`'s `/health` handler).
    pub fn summary(&self) -> Summary {
        let components: Vec<HealthResult> = self.verdicts.iter().map(|entry| entry.value().clone()).collect();
        let overall_status = if components.iter().any(HealthResult::is_abnormal) {
            Status::Abnormal
        } else {
            Status::Normal
        };
        let overall_level = components
            .iter()
            .filter(|c| c.is_abnormal())
            .filter_map(|c| c.overall_level)
            .max();
        Summary {
            overall_status,
            overall_level,
            components,
        }
    }

    pub fn reported_component_count(&self) -> usize {
        self.verdicts.len()
    }

    /// Compact `{component -> error-names}` view for orchestrator annotation
    /// (spec §4.G item 4).
    pub fn error_name_index(&self) -> HashMap<String, Vec<String>> {
        self.verdicts
            .iter()
            .filter(|entry| entry.value().is_abnormal())
            .map(|entry| {
                let names = entry
                    .value()
                    .checkers
                    .iter()
                    .filter(|c| c.is_abnormal())
                    .filter_map(|c| c.error_name.clone().or_else(|| Some(c.name.clone())))
                    .collect();
                (entry.key().clone(), names)
            })
            .collect()
    }
}

impl Default for DaemonService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CheckerResult;
    use chrono::Utc;

    fn result(name: &str, abnormal: bool) -> HealthResult {
        let checkers = if abnormal {
            vec![CheckerResult::abnormal("c", Level::Warning, "bad")]
        } else {
            vec![CheckerResult::normal("c")]
        };
        HealthResult::assemble(name, checkers, Utc::now())
    }

    #[tokio::test]
    async fn summary_is_abnormal_iff_any_component_abnormal() {
        let daemon = Arc::new(DaemonService::new());
        let (tx_a, rx_a) = broadcast::channel(8);
        let (tx_b, rx_b) = broadcast::channel(8);
        let h1 = daemon.aggregate("a".into(), rx_a);
        let h2 = daemon.aggregate("b".into(), rx_b);

        tx_a.send(result("a", false)).unwrap();
        tx_b.send(result("b", true)).unwrap();
        drop(tx_a);
        drop(tx_b);
        h1.await.unwrap();
        h2.await.unwrap();

        let summary = daemon.summary();
        assert_eq!(summary.overall_status, Status::Abnormal);
        assert_eq!(summary.overall_level, Some(Level::Warning));
        assert_eq!(summary.components.len(), 2);
    }

    #[tokio::test]
    async fn empty_daemon_has_no_reported_components() {
        let daemon = DaemonService::new();
        assert_eq!(daemon.reported_component_count(), 0);
        assert_eq!(daemon.summary().overall_status, Status::Normal);
    }
}
