use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Mutable, per-subsystem operational parameters (spec §3 "UserConfig").
///
/// Invariant: `query_interval >= 1s`, `cache_size >= 1`. Both are enforced in
/// [`UserConfig::validate`], which every config-loading path must call before
/// handing a `UserConfig` to [`crate::component::Component::build`] — per
/// spec §9's open question, `cache_size = 0` is always rejected rather than
/// silently reinterpreted as "use the default".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(with = "humantime_serde")]
    pub query_interval: Duration,
    pub cache_size: usize,
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
    #[serde(default)]
    pub ignored_checkers: Vec<String>,
    /// Subsystem-specific toggles the framework never interprets.
    #[serde(flatten)]
    pub toggles: HashMap<String, serde_yaml::Value>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum UserConfigError {
    #[error("query_interval must be at least 1s, got {0:?}")]
    IntervalTooShort(Duration),
    #[error("cache_size must be at least 1, got 0")]
    ZeroCacheSize,
}

impl UserConfig {
    pub fn validate(&self) -> Result<(), UserConfigError> {
        if self.query_interval < Duration::from_secs(1) {
            return Err(UserConfigError::IntervalTooShort(self.query_interval));
        }
        if self.cache_size == 0 {
            return Err(UserConfigError::ZeroCacheSize);
        }
        Ok(())
    }

    pub fn is_ignored(&self, checker_name: &str) -> bool {
        self.ignored_checkers.iter().any(|n| n == checker_name)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigLoadError> {
        let config: UserConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            query_interval: Duration::from_secs(30),
            cache_size: 16,
            enable_metrics: true,
            ignored_checkers: Vec::new(),
            toggles: HashMap::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error(transparent)]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Invalid(#[from] UserConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ignored_list_equals_omitted_field() {
        let with_field = UserConfig {
            ignored_checkers: Vec::new(),
            ..UserConfig::default()
        };
        let omitted: UserConfig =
            serde_yaml::from_str("query_interval: 30s\ncache_size: 16\n").unwrap();
        assert_eq!(with_field.ignored_checkers, omitted.ignored_checkers);
    }

    #[test]
    fn rejects_sub_second_interval() {
        let cfg = UserConfig {
            query_interval: Duration::from_millis(500),
            ..UserConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(UserConfigError::IntervalTooShort(Duration::from_millis(
                500
            )))
        );
    }

    #[test]
    fn rejects_zero_cache_size() {
        let cfg = UserConfig {
            cache_size: 0,
            ..UserConfig::default()
        };
        assert_eq!(cfg.validate(), Err(UserConfigError::ZeroCacheSize));
    }

    #[test]
    fn parses_go_style_durations() {
        let cfg: UserConfig =
            serde_yaml::from_str("query_interval: 2m30s\ncache_size: 4\n").unwrap();
        assert_eq!(cfg.query_interval, Duration::from_secs(150));
    }
}
