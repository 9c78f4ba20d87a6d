use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::{broadcast, watch};
use tracing::{error, info};

use crate::collector::Collector;
use crate::component::Component;
use crate::freq::FreqController;
use crate::model::{HealthResult, UserConfig};

/// Lifecycle state of a [`CommonService`] (spec §4.F). Transitions are
/// one-way: `Created -> Running -> Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceState {
    Created = 0,
    Running = 1,
    Stopped = 2,
}

impl From<u8> for ServiceState {
    fn from(v: u8) -> Self {
        match v {
            0 => ServiceState::Created,
            1 => ServiceState::Running,
            _ => ServiceState::Stopped,
        }
    }
}

/// Scheduler for one Component (spec §4.F).
///
/// Each iteration: recompute the interval from the `FreqController`, run
/// `HealthCheck` under a per-tick deadline, non-blocking-publish the Result
/// to subscribers, then sleep until the earlier of (interval elapsed,
/// cancellation, a frequency change for this component). Drift is not
/// accumulated — the next tick's target is always `last_tick + interval`,
/// recomputed fresh each time the loop wakes.
pub struct CommonService<C: Collector> {
    component: Arc<Component<C>>,
    freq: Arc<FreqController>,
    state: Arc<AtomicU8>,
    stop_tx: watch::Sender<bool>,
    results_tx: broadcast::Sender<HealthResult>,
}

/// A cloneable, `Send + Sync` handle to a running [`CommonService`], for
/// callers that want to stop it or push a config update without holding the
/// service's own (non-`Clone`) run-loop state.
#[derive(Clone)]
pub struct CommonServiceHandle<C: Collector> {
    component: Arc<Component<C>>,
    freq: Arc<FreqController>,
    state: Arc<AtomicU8>,
    stop_tx: watch::Sender<bool>,
    results_tx: broadcast::Sender<HealthResult>,
}

impl<C: Collector + 'static> CommonService<C> {
    pub fn new(component: Arc<Component<C>>, freq: Arc<FreqController>) -> Self {
        let (stop_tx, _) = watch::channel(false);
        let (results_tx, _) = broadcast::channel(64);
        freq.register(component.name(), component.query_interval());
        Self {
            component,
            freq,
            state: Arc::new(AtomicU8::new(ServiceState::Created as u8)),
            stop_tx,
            results_tx,
        }
    }

    pub fn handle(&self) -> CommonServiceHandle<C> {
        CommonServiceHandle {
            component: self.component.clone(),
            freq: self.freq.clone(),
            state: self.state.clone(),
            stop_tx: self.stop_tx.clone(),
            results_tx: self.results_tx.clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealthResult> {
        self.results_tx.subscribe()
    }

    /// Spawns the run loop as its own task and returns its join handle plus a
    /// cloneable control handle. The caller is expected to `.await` the join
    /// handle during shutdown to honor spec §4.F's "Stop() cancels and joins
    /// the task."
    pub fn spawn(self) -> (tokio::task::JoinHandle<()>, CommonServiceHandle<C>) {
        let handle = self.handle();
        let join = tokio::spawn(self.run());
        (join, handle)
    }

    async fn run(self) {
        self.state
            .store(ServiceState::Running as u8, Ordering::SeqCst);
        let name = self.component.name().to_string();
        let mut stop_rx = self.stop_tx.subscribe();
        let mut freq_rx = self.freq.subscribe();
        let mut last_tick = Instant::now() - self.current_interval();

        info!(component = %name, "common service started");

        loop {
            if *stop_rx.borrow() {
                break;
            }

            let interval = self.current_interval();
            let target = last_tick + interval;

            tokio::select! {
                _ = tokio::time::sleep_until(target.into()) => {}
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                    continue;
                }
                Ok(_) = freq_rx.recv() => {
                    // Any frequency change re-enters the loop to recompute our
                    // own target; a change for another component is a cheap
                    // no-op recompute.
                    continue;
                }
            }

            let deadline = Instant::now() + interval;
            let component = self.component.clone();
            let outcome = AssertUnwindSafe(component.health_check(deadline))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(Some(result))) => {
                    let _ = self.results_tx.send(result);
                }
                Ok(Ok(None)) => {
                    // Collector transient failure: ring buffer not advanced, retry next tick.
                }
                Ok(Err(err)) => {
                    error!(component = %name, error = %err, "component error during health check");
                }
                Err(_) => {
                    error!(component = %name, "health check panicked; service continues on next tick");
                }
            }

            last_tick = Instant::now();
        }

        self.state
            .store(ServiceState::Stopped as u8, Ordering::SeqCst);
        info!(component = %name, "common service stopped");
    }

    fn current_interval(&self) -> Duration {
        self.freq
            .get(self.component.name())
            .unwrap_or_else(|| self.component.query_interval())
    }
}

impl<C: Collector> CommonServiceHandle<C> {
    pub fn state(&self) -> ServiceState {
        ServiceState::from(self.state.load(Ordering::SeqCst))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealthResult> {
        self.results_tx.subscribe()
    }

    /// Signals cancellation; does not block. Callers that spawned the
    /// service via [`CommonService::spawn`] should additionally `.await` the
    /// returned `JoinHandle` to observe termination.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Validates and swaps the component's `UserConfig`, then pushes the new
    /// query interval through the `FreqController` so the scheduler wakes
    /// and adopts it on (at most) its next tick decision — spec §4.D/§4.E.
    pub fn update_config(&self, config: UserConfig) -> Result<(), crate::error::ComponentError> {
        let interval = config.query_interval;
        self.component.update_config(config)?;
        self.freq.set(self.component.name(), interval);
        Ok(())
    }

    /// A one-shot health check outside the scheduler's cadence, e.g. for a
    /// peer Collector (spec §4.B) that needs a fresh snapshot right now.
    pub async fn run_once(&self, deadline: Instant) -> Result<Option<HealthResult>, crate::error::ComponentError> {
        self.component.health_check(deadline).await
    }

    pub fn component(&self) -> &Arc<Component<C>> {
        &self.component
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::Checker;
    use crate::error::{CheckError, CollectError};
    use crate::model::CheckerResult;
    use crate::snapshot::Snapshot;
    use std::sync::atomic::AtomicU32;

    struct TickCollector {
        count: AtomicU32,
    }
    impl Collector for TickCollector {
        type Output = u32;
        fn subsystem(&self) -> &'static str {
            "tick"
        }
        async fn collect(&self, _deadline: Instant) -> Result<u32, CollectError> {
            Ok(self.count.fetch_add(1, Ordering::SeqCst))
        }
    }
    struct NoopChecker;
    impl Checker<u32> for NoopChecker {
        fn name(&self) -> &str {
            "noop"
        }
        fn check(&self, _s: &Snapshot<u32>) -> Result<CheckerResult, CheckError> {
            Ok(CheckerResult::normal("noop"))
        }
    }

    fn build(interval: Duration) -> Arc<Component<TickCollector>> {
        Arc::new(
            Component::build(
                "tick",
                TickCollector {
                    count: AtomicU32::new(0),
                },
                vec![Box::new(NoopChecker)],
                UserConfig {
                    query_interval: interval,
                    cache_size: 8,
                    ..UserConfig::default()
                },
            )
            .unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_at_configured_interval() {
        let component = build(Duration::from_secs(1));
        let freq = Arc::new(FreqController::new());
        let service = CommonService::new(component.clone(), freq);
        let (join, handle) = service.spawn();

        // First tick fires immediately; then one more per second elapsed.
        for n in 1..=3u32 {
            tokio::time::advance(Duration::from_secs(1)).await;
            tokio::task::yield_now().await;
            assert!(
                component.cache_results().len() as u32 >= n,
                "expected at least {n} ticks, got {}",
                component.cache_results().len()
            );
        }

        handle.stop();
        join.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn update_shortens_next_tick_without_waiting_full_old_interval() {
        let component = build(Duration::from_secs(30));
        let freq = Arc::new(FreqController::new());
        let service = CommonService::new(component.clone(), freq);
        let (join, handle) = service.spawn();

        // First tick happens immediately (last_tick initialized in the past).
        tokio::time::advance(Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(component.cache_results().len(), 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        handle
            .update_config(UserConfig {
                query_interval: Duration::from_secs(5),
                cache_size: 8,
                ..UserConfig::default()
            })
            .unwrap();
        tokio::task::yield_now().await;

        // At most 5s after the prior tick, not 30s.
        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        let cached = component.cache_results();
        assert!(cached.len() >= 2, "expected at least one more tick after the update, got {}", cached.len());
        let gap = cached[1].timestamp - cached[0].timestamp;
        assert!(
            gap <= chrono::Duration::seconds(6),
            "expected the second tick within ~5s of the first, not the original 30s interval; got {gap}",
        );

        handle.stop();
        join.await.unwrap();
    }
}
