use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use super::event_rule::Level;

/// `status` field of a [`CheckerResult`] (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Normal,
    Abnormal,
}

/// One Checker's verdict for one tick (spec §3 "CheckerResult").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckerResult {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub spec_value: Option<String>,
    #[serde(default)]
    pub current_value: Option<String>,
    pub status: Status,
    #[serde(default)]
    pub level: Option<Level>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub error_name: Option<String>,
    #[serde(default)]
    pub suggestion: Option<String>,
}

impl CheckerResult {
    pub fn normal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            device: None,
            spec_value: None,
            current_value: None,
            status: Status::Normal,
            level: None,
            detail: None,
            error_name: None,
            suggestion: None,
        }
    }

    pub fn abnormal(name: impl Into<String>, level: Level, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            device: None,
            spec_value: None,
            current_value: None,
            status: Status::Abnormal,
            level: Some(level),
            detail: Some(detail.into()),
            error_name: None,
            suggestion: None,
        }
    }

    /// A checker-logic-error result synthesized per spec §7: "that Checker's
    /// result is synthesized as abnormal with `detail = "internal error"`".
    pub fn internal_error(name: impl Into<String>) -> Self {
        Self::abnormal(name, Level::Critical, "internal error")
    }

    pub fn is_abnormal(&self) -> bool {
        self.status == Status::Abnormal
    }
}

/// A Component's aggregate classification for one tick (spec §3 "Result").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResult {
    pub component_name: String,
    pub overall_status: Status,
    pub overall_level: Option<Level>,
    pub checkers: Vec<CheckerResult>,
    pub timestamp: DateTime<Utc>,
}

impl HealthResult {
    /// Assembles a Result from a component's checker outputs per spec §3:
    /// `overall_status = abnormal` iff any checker is abnormal;
    /// `overall_level = max(level for abnormal checkers)`.
    pub fn assemble(
        component_name: impl Into<String>,
        checkers: Vec<CheckerResult>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let overall_level = checkers
            .iter()
            .filter(|c| c.is_abnormal())
            .filter_map(|c| c.level)
            .max();
        let overall_status = if checkers.iter().any(CheckerResult::is_abnormal) {
            Status::Abnormal
        } else {
            Status::Normal
        };
        Self {
            component_name: component_name.into(),
            overall_status,
            overall_level,
            checkers,
            timestamp,
        }
    }

    pub fn is_abnormal(&self) -> bool {
        self.overall_status == Status::Abnormal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_is_info_lt_warning_lt_critical() {
        assert!(Level::Info < Level::Warning);
        assert!(Level::Warning < Level::Critical);
    }

    #[test]
    fn overall_status_is_abnormal_iff_any_checker_abnormal() {
        let now = Utc::now();
        let result = HealthResult::assemble(
            "gpu",
            vec![
                CheckerResult::normal("driver_version"),
                CheckerResult::abnormal("temperature", Level::Warning, "hot"),
            ],
            now,
        );
        assert_eq!(result.overall_status, Status::Abnormal);
        assert_eq!(result.overall_level, Some(Level::Warning));
    }

    #[test]
    fn overall_level_is_max_of_abnormal_checkers() {
        let now = Utc::now();
        let result = HealthResult::assemble(
            "gpu",
            vec![
                CheckerResult::abnormal("a", Level::Info, "d1"),
                CheckerResult::abnormal("b", Level::Critical, "d2"),
                CheckerResult::abnormal("c", Level::Warning, "d3"),
            ],
            now,
        );
        assert_eq!(result.overall_level, Some(Level::Critical));
    }

    #[test]
    fn all_normal_has_no_overall_level() {
        let now = Utc::now();
        let result = HealthResult::assemble(
            "gpu",
            vec![CheckerResult::normal("a"), CheckerResult::normal("b")],
            now,
        );
        assert_eq!(result.overall_status, Status::Normal);
        assert_eq!(result.overall_level, None);
    }
}
