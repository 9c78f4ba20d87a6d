use std::sync::Arc;
use std::time::{Duration, Instant};

use rigwatch_core::error::{CheckError, CollectError};
use rigwatch_core::model::{CheckerResult, UserConfig};
use rigwatch_core::snapshot::Snapshot;
use rigwatch_core::{Checker, Collector, Component, CommonService, FreqController};

struct NoopCollector;
impl Collector for NoopCollector {
    type Output = ();
    fn subsystem(&self) -> &'static str {
        "noop"
    }
    async fn collect(&self, _deadline: Instant) -> Result<(), CollectError> {
        Ok(())
    }
}
struct NoopChecker;
impl Checker<()> for NoopChecker {
    fn name(&self) -> &str {
        "noop"
    }
    fn check(&self, _snapshot: &Snapshot<()>) -> Result<CheckerResult, CheckError> {
        Ok(CheckerResult::normal("noop"))
    }
}

/// S5 (missing subsystem): a subsystem absent from the enable list (e.g. no
/// InfiniBand sysfs on this node) is simply never instantiated; the
/// remaining components determine readiness.
#[test]
fn missing_subsystem_is_excluded_without_affecting_the_rest() {
    let config = rigwatch::config::RuntimeConfig::resolve(&rigwatch::cli::RunArgs {
        spec: None,
        cfg: None,
        event_rules: None,
        enable_components: vec!["memory".to_string(), "cpu".to_string()],
        ignore_components: Vec::new(),
        annotation_key: None,
        metrics_socket: None,
        cluster_name: None,
        log_file: None,
        log_level: None,
        log_max_size: None,
        log_max_backups: None,
        log_max_age: None,
        log_compress: false,
        log_also_stdout: false,
    });

    let selected = config.selected_components(&["memory", "cpu", "infiniband", "kernel_log"]);
    assert_eq!(selected, vec!["memory".to_string(), "cpu".to_string()]);
    assert!(!selected.contains(&"infiniband".to_string()));
}

/// S6 (graceful shutdown): signaling stop on a running Component's Service
/// reaches the `Stopped` state and the scheduling task joins cleanly.
#[tokio::test]
async fn stop_signal_drains_the_service_to_a_joined_stop() {
    let component = Arc::new(
        Component::build(
            "noop",
            NoopCollector,
            vec![Box::new(NoopChecker)],
            UserConfig {
                query_interval: Duration::from_secs(1),
                cache_size: 4,
                ..UserConfig::default()
            },
        )
        .unwrap(),
    );
    let freq = Arc::new(FreqController::new());
    let service = CommonService::new(component.clone(), freq);
    let (join, handle) = service.spawn();

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(!component.cache_results().is_empty());

    handle.stop();
    tokio::time::timeout(Duration::from_secs(3), join).await.expect("service did not stop within the drain window").unwrap();
    assert_eq!(handle.state(), rigwatch_core::ServiceState::Stopped);
}
