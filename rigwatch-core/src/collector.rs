use std::future::Future;
use std::time::Instant;

use crate::error::CollectError;

/// The snapshot-producing half of a Component (spec §4.B).
///
/// `collect` must be idempotent and side-effect-free from the framework's
/// point of view (the subsystem itself may perform syscalls, sysfs reads,
/// vendor-library calls) and must respect `deadline`. Implemented with a
/// native `async fn` in trait (stable since 1.75) rather than `async-trait`'s
/// boxing macro — see `DESIGN.md` for why that deviates from the teacher's
/// own `async_trait` usage.
pub trait Collector: Send + Sync {
    type Output: Send + Sync + Clone + 'static;

    /// Stable name of the subsystem this collector probes, used in error
    /// messages and metrics labels.
    fn subsystem(&self) -> &'static str;

    fn collect(
        &self,
        deadline: Instant,
    ) -> impl Future<Output = Result<Self::Output, CollectError>> + Send;
}
