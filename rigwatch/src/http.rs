use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use rigwatch_core::model::Level;
use rigwatch_core::DaemonService;
use tokio::net::UnixListener;
use tracing::info;

use crate::metrics::Metrics;

/// HTTP surface on a Unix socket (spec §4.G item 3): `/metrics` in
/// Prometheus text-exposition format, `/health` returning 200 iff every
/// expected component has reported at least once and the summary is not
/// abnormal-critical.
#[derive(Clone)]
struct AppState {
    daemon: Arc<DaemonService>,
    metrics: Arc<Metrics>,
    expected_components: usize,
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.update_from_summary(&state.daemon.summary());
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let summary = state.daemon.summary();
    let all_reported = state.daemon.reported_component_count() >= state.expected_components;
    let abnormal_critical = summary.overall_level == Some(Level::Critical);
    if all_reported && !abnormal_critical {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

/// Binds `socket_path`, removing a stale socket file left by a prior run,
/// and serves `/metrics` + `/health` until the process is signalled to
/// shut down. `axum::serve` accepts a `tokio::net::UnixListener` directly —
/// no extra crate needed.
pub async fn serve(
    socket_path: PathBuf,
    daemon: Arc<DaemonService>,
    metrics: Arc<Metrics>,
    expected_components: usize,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let socket_path = socket_path.as_path();
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(socket_path)?;
    info!(socket = %socket_path.display(), "metrics/health HTTP surface listening");

    let state = AppState {
        daemon,
        metrics,
        expected_components,
    };
    let app = router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigwatch_core::model::{CheckerResult, HealthResult};
    use tower::ServiceExt;

    fn health_request() -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder().uri("/health").body(axum::body::Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_unavailable_until_all_components_reported() {
        let daemon = Arc::new(DaemonService::new());
        let state = AppState {
            daemon,
            metrics: Arc::new(Metrics::new()),
            expected_components: 1,
        };
        let response = router(state).oneshot(health_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn health_is_ok_once_all_components_reported_normally() {
        let daemon = Arc::new(DaemonService::new());
        daemon.record("memory".to_string(), HealthResult::assemble("memory", vec![CheckerResult::normal("memory_utilization")], chrono::Utc::now()));
        let state = AppState {
            daemon,
            metrics: Arc::new(Metrics::new()),
            expected_components: 1,
        };
        let response = router(state).oneshot(health_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_prometheus_text() {
        let daemon = Arc::new(DaemonService::new());
        let state = AppState {
            daemon,
            metrics: Arc::new(Metrics::new()),
            expected_components: 0,
        };
        let request = axum::http::Request::builder().uri("/metrics").body(axum::body::Body::empty()).unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
