pub mod annotation;
pub mod cli;
pub mod config;
pub mod errors;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod subsystems;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rigwatch_core::model::{EventRule, Level, Source, Status, UserConfig};
use rigwatch_core::{CommonService, Component, DaemonService, FreqController, Summary};
use tokio::sync::watch;
use tracing::{error, info};

use annotation::{AnnotationDriver, LoggingAnnotationSink, LoggingReadinessNotifier};
use config::RuntimeConfig;
use metrics::Metrics;
use subsystems::cpu::{CpuChecker, CpuCollector, CpuFragment};
use subsystems::gpu_hang::FixtureGpuHangCollector;
use subsystems::kernel_log::{KernelLogChecker, KernelLogCollector};
use subsystems::memory::{MemoryChecker, MemoryCollector, MemoryFragment};

pub const DEFAULT_COMPONENTS: &[&str] = &["memory", "cpu", "kernel_log", "gpu_hang"];

/// Runs the daemon to completion: loads spec/configs, starts every selected
/// Component's Service, serves the metrics/health HTTP surface, and blocks
/// until a shutdown signal drains everything (spec §4.G). Returns the final
/// aggregated `Summary` so the caller can map it to an exit code (spec §6).
///
/// Configuration errors (spec missing, YAML parse error) are fatal at
/// startup per spec §7 and propagate out of this function rather than being
/// downgraded to a warning.
pub async fn run(config: RuntimeConfig) -> anyhow::Result<Summary> {
    let spec = config.load_spec()?;
    let user_configs = config.load_user_configs()?;
    let event_rules = config.load_event_rules()?;

    let freq = Arc::new(FreqController::new());
    let daemon = Arc::new(DaemonService::new());

    let selected = config.selected_components(DEFAULT_COMPONENTS);
    let selected_set: HashSet<&str> = selected.iter().map(String::as_str).collect();
    info!(components = ?selected, "starting selected components");

    let mut join_handles = Vec::new();
    let mut aggregation_handles = Vec::new();

    if selected_set.contains("memory") {
        let user_config = user_configs.get("memory").cloned().unwrap_or_default();
        let fragment: MemoryFragment = spec.fragment("memory", "default").unwrap_or_default();
        let component = Arc::new(Component::build(
            "memory",
            MemoryCollector::new(),
            vec![Box::new(MemoryChecker::new(fragment))],
            user_config,
        )?);
        let service = CommonService::new(component, freq.clone());
        let results = service.subscribe();
        let (join, _handle) = service.spawn();
        join_handles.push(join);
        aggregation_handles.push(daemon.aggregate("memory".to_string(), results));
    }

    if selected_set.contains("cpu") {
        let user_config = user_configs.get("cpu").cloned().unwrap_or_default();
        let fragment: CpuFragment = spec.fragment("cpu", "default").unwrap_or_default();
        let component = Arc::new(Component::build(
            "cpu",
            CpuCollector::new(),
            vec![Box::new(CpuChecker::new(fragment))],
            user_config,
        )?);
        let service = CommonService::new(component, freq.clone());
        let results = service.subscribe();
        let (join, _handle) = service.spawn();
        join_handles.push(join);
        aggregation_handles.push(daemon.aggregate("cpu".to_string(), results));
    }

    if selected_set.contains("kernel_log") {
        match build_kernel_log_component(&event_rules, user_configs.get("kernel_log").cloned()) {
            Ok(component) => {
                let service = CommonService::new(component, freq.clone());
                let results = service.subscribe();
                let (join, _handle) = service.spawn();
                join_handles.push(join);
                aggregation_handles.push(daemon.aggregate("kernel_log".to_string(), results));
            }
            Err(err) => {
                error!(error = %err, "kernel_log component not started");
            }
        }
    }

    if selected_set.contains("gpu_hang") {
        let user_config = user_configs.get("gpu_hang").cloned().unwrap_or_default();
        let collector = FixtureGpuHangCollector::constant(vec!["gpu0".to_string()], "sm_occupancy", 0.0);
        let checker = rigwatch_core::HangChecker::new(
            "gpu_hang",
            default_hang_rule(),
            Arc::new(rigwatch_core::hang::NoWorkloadLookup),
            freq.clone(),
            "gpu_hang",
            "gpu_hang",
        );
        let component = Arc::new(Component::build("gpu_hang", collector, vec![Box::new(checker)], user_config)?);
        let service = CommonService::new(component, freq.clone());
        let results = service.subscribe();
        let (join, _handle) = service.spawn();
        join_handles.push(join);
        aggregation_handles.push(daemon.aggregate("gpu_hang".to_string(), results));
    }

    let expected_components = join_handles.len();
    let metrics = Arc::new(Metrics::new());
    let annotation = AnnotationDriver::new(
        config.annotation_key.clone(),
        Arc::new(LoggingAnnotationSink::new()),
        Arc::new(LoggingReadinessNotifier::new()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let annotation_task = spawn_annotation_poller(daemon.clone(), annotation, shutdown_rx.clone());

    let http_task = tokio::spawn(http::serve(config.metrics_socket.clone(), daemon.clone(), metrics, expected_components, shutdown_rx.clone()));

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, draining");
    let _ = shutdown_tx.send(true);

    for handle in join_handles {
        let _ = handle.await;
    }
    for handle in aggregation_handles {
        let _ = handle.await;
    }
    let _ = annotation_task.await;

    const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
    let http_abort = http_task.abort_handle();
    match tokio::time::timeout(DRAIN_TIMEOUT, http_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => error!(error = %err, "http surface exited with an error"),
        Ok(Err(err)) => error!(error = %err, "http task panicked"),
        Err(_) => {
            error!(timeout = ?DRAIN_TIMEOUT, "http surface did not drain in time, aborting");
            http_abort.abort();
        }
    }

    info!("shutdown complete");
    Ok(daemon.summary())
}

fn build_kernel_log_component(
    event_rules: &rigwatch_core::model::EventRuleFile,
    user_config: Option<UserConfig>,
) -> anyhow::Result<Arc<Component<KernelLogCollector>>> {
    let rules: Vec<EventRule> = event_rules.rules().cloned().collect();
    let rules = if rules.is_empty() {
        vec![EventRule {
            name: "oom".to_string(),
            description: Some("out-of-memory kill".to_string()),
            source: Source::LogFile(std::path::PathBuf::from("/var/log/kern.log")),
            regexp: "Out of memory".to_string(),
            level: Level::Critical,
        }]
    } else {
        rules
    };

    let registry = Arc::new(rigwatch_core::FileRegistry::new());
    let scratch_dir = std::env::temp_dir();
    let filter = Arc::new(rigwatch_core::EventFilter::new(rules, registry, scratch_dir, 100, 16)?);

    let component = Component::build(
        "kernel_log",
        KernelLogCollector::new(filter),
        vec![Box::new(KernelLogChecker)],
        user_config.unwrap_or_default(),
    )?;
    Ok(Arc::new(component))
}

fn default_hang_rule() -> rigwatch_core::HangRule {
    let mut indicators = std::collections::HashMap::new();
    indicators.insert(
        "sm_occupancy".to_string(),
        rigwatch_core::hang::IndicatorRule {
            threshold: 0.01,
            comparator: rigwatch_core::hang::Comparator::Lt,
        },
    );
    rigwatch_core::HangRule {
        indicators,
        duration_threshold: Duration::from_secs(300),
        query_interval_after_abnormal: Duration::from_secs(10),
        abnormal_detected_times: 3,
        ignore_namespaces: HashSet::new(),
    }
}

/// Polls the current verdict map on an interval and drives the annotation
/// sink/readiness notifier. An event-driven per-arrival hook would save the
/// poll interval's worst-case latency; a fixed poll is simpler to reason
/// about for the handful of components this binary ships and keeps the
/// annotation seam decoupled from any one component's cadence.
fn spawn_annotation_poller(daemon: Arc<DaemonService>, annotation: AnnotationDriver, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if daemon.reported_component_count() > 0 {
                        annotation.on_aggregation_update(daemon.error_name_index());
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

/// Blocks until SIGINT/SIGTERM (or, off Unix, Ctrl-C) is received (spec
/// §4.G item 6).
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Process exits 0 iff the final aggregated status is normal.
pub const EXIT_OK: i32 = 0;
/// Distinct non-zero exit for a normal shutdown with an overall-abnormal status (spec §6).
pub const EXIT_OVERALL_ABNORMAL: i32 = 1;
/// Distinct non-zero exit for a startup failure that never reached a summary (spec §6).
pub const EXIT_STARTUP_FAILURE: i32 = 2;

/// Maps the daemon's final `Summary` to the process exit code spec §6 calls for:
/// 0 overall-normal, non-zero overall-abnormal.
pub fn exit_code_for_summary(summary: &Summary) -> i32 {
    match summary.overall_status {
        Status::Normal => EXIT_OK,
        Status::Abnormal => EXIT_OVERALL_ABNORMAL,
    }
}
