use crate::error::CheckError;
use crate::model::CheckerResult;
use crate::snapshot::Snapshot;

/// The verdict-producing half of a Component (spec §4.C).
///
/// `check` is a pure function of (snapshot, spec fragment, prior checker
/// state) — spec fragments and state are expected to be baked into the
/// concrete `Checker` implementation at construction time (e.g. holding an
/// `Arc<GpuFragment>` and, for stateful checkers like the Hang Detector, a
/// `Mutex<HangState>`). A Checker set for one Component is the declared
/// universe minus any names in the `UserConfig`'s ignored list — see
/// [`crate::component::Component::active_checkers`].
pub trait Checker<T>: Send + Sync {
    /// Stable name used for `ignored_checkers` matching and result labeling.
    fn name(&self) -> &str;

    fn check(&self, snapshot: &Snapshot<T>) -> Result<CheckerResult, CheckError>;
}
