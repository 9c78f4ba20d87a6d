use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{error, warn};

use crate::checker::Checker;
use crate::collector::Collector;
use crate::error::ComponentError;
use crate::model::{CheckerResult, HealthResult, UserConfig};
use crate::ring_buffer::RingBuffer;
use crate::snapshot::Snapshot;

/// Type-erased capability surface a [`Component`] exposes to the Daemon
/// Service and to peer Collectors (spec §4.D "Accessors").
///
/// This is the seam a heterogeneous [`ComponentRegistry`] stores trait
/// objects behind, and the seam the Hang Detector's peer-cooperation (spec
/// §4.B) would use to ask "has the GPU component reported recently" without
/// knowing the GPU snapshot's concrete type.
pub trait ComponentHandle: Send + Sync {
    fn name(&self) -> &str;
    fn last_result(&self) -> Option<HealthResult>;
    fn cache_results(&self) -> Vec<HealthResult>;
    fn total_ticks(&self) -> u64;
}

/// The atomic unit the scheduler drives (spec §4.D).
///
/// Owns one Collector, an ordered list of Checkers, the effective
/// `UserConfig`, and a ring buffer. `health_check` is the only compute path:
/// collector -> checkers -> assembled Result -> ring buffer write. Exactly
/// one [`crate::service::CommonService`] drives a given Component's
/// `health_check`, so calls never overlap (spec §5 ordering guarantee); the
/// lock inside [`RingBuffer`] is for readers racing the single writer, not
/// for serializing writers against each other.
pub struct Component<C: Collector> {
    name: String,
    collector: C,
    checkers: Vec<Box<dyn Checker<C::Output>>>,
    config: parking_lot::RwLock<UserConfig>,
    ring_buffer: RingBuffer<C::Output>,
}

impl<C: Collector> Component<C> {
    /// Per spec §4.D: "construction is memoized per component name using
    /// first-wins semantics; a panic during construction is captured and
    /// surfaced as an error." Memoization itself lives in
    /// [`ComponentRegistry::get_or_build`]; this constructor is the
    /// panic-capturing half.
    pub fn build(
        name: impl Into<String>,
        collector: C,
        checkers: Vec<Box<dyn Checker<C::Output>>>,
        config: UserConfig,
    ) -> Result<Self, ComponentError> {
        let name = name.into();
        config.validate().map_err(|e| ComponentError::InvalidConfig {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        let cache_size = config.cache_size;
        let result = panic::catch_unwind(AssertUnwindSafe(|| Self {
            name: name.clone(),
            collector,
            checkers,
            config: parking_lot::RwLock::new(config),
            ring_buffer: RingBuffer::new(cache_size),
        }));
        result.map_err(|payload| ComponentError::ConstructionPanicked {
            name: name.clone(),
            message: panic_message(payload),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn query_interval(&self) -> Duration {
        self.config.read().query_interval
    }

    /// Checker names active for this component: the declared universe minus
    /// any names in the `UserConfig`'s ignored list (spec §4.C).
    pub fn active_checkers(&self) -> impl Iterator<Item = &dyn Checker<C::Output>> {
        let ignored = self.config.read().ignored_checkers.clone();
        self.checkers
            .iter()
            .filter(move |c| !ignored.iter().any(|n| n == c.name()))
            .map(|c| c.as_ref())
    }

    /// `Update(cfg)` validates the type, swaps the stored config under a
    /// write lock (spec §4.D). Adopting the new interval on the scheduler's
    /// next tick is the Common Service's responsibility, driven by the
    /// `FreqController` (spec §4.E/§4.F), not this method.
    pub fn update_config(&self, config: UserConfig) -> Result<(), ComponentError> {
        config
            .validate()
            .map_err(|e| ComponentError::InvalidConfig {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;
        if config.cache_size != self.ring_buffer.capacity() {
            warn!(
                component = %self.name,
                old = self.ring_buffer.capacity(),
                new = config.cache_size,
                "cache_size change requires a component restart to take effect; ring buffer capacity is unchanged",
            );
        }
        *self.config.write() = config;
        Ok(())
    }

    /// The only compute path (spec §4.D): collect, check, assemble, cache.
    /// Returns `Ok(None)` on a collector transient failure per spec §7 — the
    /// ring buffer is not advanced and the caller should retry next tick.
    pub async fn health_check(
        &self,
        deadline: Instant,
    ) -> Result<Option<HealthResult>, ComponentError> {
        let collected = self.collector.collect(deadline).await;
        let value = match collected {
            Ok(value) => value,
            Err(err) => {
                warn!(component = %self.name, error = %err, "collector transient failure, retrying next tick");
                return Ok(None);
            }
        };
        let snapshot = Snapshot::now(value);

        let mut results = Vec::new();
        for checker in self.active_checkers() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| checker.check(&snapshot)));
            let checker_result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(err)) => {
                    error!(component = %self.name, checker = checker.name(), error = %err, "checker logic error");
                    CheckerResult::internal_error(checker.name())
                }
                Err(payload) => {
                    error!(component = %self.name, checker = checker.name(), panic = %panic_message(payload), "checker panicked");
                    CheckerResult::internal_error(checker.name())
                }
            };
            results.push(checker_result);
        }

        let result = HealthResult::assemble(&self.name, results, snapshot.timestamp);
        self.ring_buffer.push(snapshot, result.clone());
        Ok(Some(result))
    }

    pub fn last_result(&self) -> Option<HealthResult> {
        self.ring_buffer.last_result()
    }

    pub fn last_info(&self) -> Option<Snapshot<C::Output>> {
        self.ring_buffer.last_info()
    }

    pub fn cache_results(&self) -> Vec<HealthResult> {
        self.ring_buffer.cache_results()
    }

    pub fn cache_infos(&self) -> Vec<Snapshot<C::Output>> {
        self.ring_buffer.cache_infos()
    }
}

impl<C: Collector> ComponentHandle for Component<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn last_result(&self) -> Option<HealthResult> {
        self.ring_buffer.last_result()
    }

    fn cache_results(&self) -> Vec<HealthResult> {
        self.ring_buffer.cache_results()
    }

    fn total_ticks(&self) -> u64 {
        self.ring_buffer.total_writes()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Process-wide component registry, memoizing by name with first-wins
/// semantics (spec §3 "Component lifecycle", §9 "process-wide singletons...
/// modeled as explicit services").
pub struct ComponentRegistry {
    handles: DashMap<String, Arc<dyn ComponentHandle>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
        }
    }

    /// Registers `handle` under `name` unless a component of that name was
    /// already registered (first-wins). Returns the handle that is actually
    /// live under that name, which is `handle` itself unless it lost a race.
    pub fn get_or_insert(
        &self,
        name: &str,
        handle: Arc<dyn ComponentHandle>,
    ) -> Arc<dyn ComponentHandle> {
        self.handles
            .entry(name.to_string())
            .or_insert(handle)
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ComponentHandle>> {
        self.handles.get(name).map(|e| e.value().clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.handles.iter().map(|e| e.key().clone()).collect()
    }

    pub fn all(&self) -> Vec<Arc<dyn ComponentHandle>> {
        self.handles.iter().map(|e| e.value().clone()).collect()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
