use std::path::PathBuf;

/// Errors returned by a [`crate::collector::Collector`].
///
/// Per spec §7, these are "transient failures": the Component logs them and
/// retries on the next tick rather than advancing the ring buffer.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("collector for {subsystem} exceeded its deadline")]
    DeadlineExceeded { subsystem: &'static str },

    #[error("collector for {subsystem} failed to read {path}")]
    Io {
        subsystem: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("collector for {subsystem} is missing on this node")]
    SubsystemAbsent { subsystem: &'static str },

    #[error("collector for {subsystem}: {message}")]
    Other {
        subsystem: &'static str,
        message: String,
    },
}

/// Errors a [`crate::checker::Checker`] reports for itself.
///
/// Per spec §7, these are recovered at the Checker boundary: the offending
/// checker's result is synthesized as abnormal, its siblings still run.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("checker {checker} received a snapshot of the wrong type")]
    SnapshotTypeMismatch { checker: &'static str },

    #[error("checker {checker}: spec fragment missing required field {field}")]
    MissingSpecField {
        checker: &'static str,
        field: &'static str,
    },

    #[error("checker {checker}: {message}")]
    Internal {
        checker: &'static str,
        message: String,
    },
}

/// Errors surfaced at the Component boundary (construction, configuration).
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("component {name} construction panicked: {message}")]
    ConstructionPanicked { name: String, message: String },

    #[error("component {name} rejected configuration: {reason}")]
    InvalidConfig { name: String, reason: String },

    #[error("component {name} not found")]
    NotFound { name: String },
}

/// Errors from the [`crate::event_filter::EventFilter`].
#[derive(Debug, thiserror::Error)]
pub enum EventFilterError {
    #[error("invalid regex for rule {rule}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to spawn command for rule {rule}: {argv:?}")]
    CommandSpawn {
        rule: String,
        argv: Vec<String>,
        #[source]
        source: std::io::Error,
    },
}
