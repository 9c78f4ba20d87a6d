use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Severity of a matched [`EventRule`] (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Critical,
}

/// Where an [`EventRule`] reads its lines from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    LogFile(PathBuf),
    Cmd(Vec<String>),
}

/// A compiled matcher: `(name, source, pattern, level)` (spec §3).
///
/// The `regexp` field is the uncompiled pattern text as loaded from YAML;
/// [`crate::event_filter::EventFilter::compile`] turns a set of these into
/// live `regex::Regex` instances once at construction, per spec §4.A ("a
/// malformed regex fails filter construction").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRule {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub source: Source,
    pub regexp: String,
    pub level: Level,
}

/// Per-subsystem event-rule file: `event_checkers: { <name>: {...} }` (spec §6).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRuleFile {
    #[serde(default)]
    pub event_checkers: HashMap<String, EventRule>,
}

impl EventRuleFile {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn rules(&self) -> impl Iterator<Item = &EventRule> {
        self.event_checkers.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_file_rule() {
        let yaml = r#"
event_checkers:
  oom:
    name: oom
    log_file: /var/log/kern.log
    regexp: "Out of memory"
    level: critical
"#;
        let file = EventRuleFile::from_yaml(yaml).unwrap();
        let rule = &file.event_checkers["oom"];
        assert_eq!(rule.level, Level::Critical);
        assert_eq!(rule.source, Source::LogFile("/var/log/kern.log".into()));
    }

    #[test]
    fn parses_cmd_rule() {
        let yaml = r#"
event_checkers:
  ibstat:
    name: ibstat
    cmd: ["ibstat", "-p"]
    regexp: "Down"
    level: warning
"#;
        let file = EventRuleFile::from_yaml(yaml).unwrap();
        let rule = &file.event_checkers["ibstat"];
        assert_eq!(
            rule.source,
            Source::Cmd(vec!["ibstat".to_string(), "-p".to_string()])
        );
    }
}
