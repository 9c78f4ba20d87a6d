mod event_rule;
mod result;
mod spec;
mod user_config;

pub use event_rule::{EventRule, EventRuleFile, Level, Source};
pub use result::{CheckerResult, HealthResult, Status};
pub use spec::{Spec, SpecError, SubsystemSpec};
pub use user_config::{ConfigLoadError, UserConfig, UserConfigError};
