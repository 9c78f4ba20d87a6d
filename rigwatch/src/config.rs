use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rigwatch_core::model::{ConfigLoadError, EventRuleFile, Spec, UserConfig};
use tracing::info;

use crate::cli::RunArgs;

/// Ambient logging configuration (expansion §3.1), mirroring the CLI
/// surface in spec.md §6 (`--log-file`, `--log-level`, ...).
///
/// Only daily rotation is actually applied by [`crate::logging::init`]
/// (`tracing-appender`'s native rotation granularity). `log_max_size_mb`,
/// `log_max_backups`, `log_max_age_days`, and `log_compress` are accepted
/// from the CLI/config file and carried here, but are not yet consulted —
/// no crate in this workspace's dependency stack performs size-triggered
/// rotation, backup pruning, or gzip of rotated files.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_file: Option<PathBuf>,
    pub log_level: String,
    pub log_max_size_mb: u64,
    pub log_max_backups: u32,
    pub log_max_age_days: u32,
    pub log_compress: bool,
    pub log_also_stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            log_level: "info".to_string(),
            log_max_size_mb: 100,
            log_max_backups: 5,
            log_max_age_days: 28,
            log_compress: false,
            log_also_stdout: true,
        }
    }
}

/// Composed runtime configuration: CLI flags (highest precedence) ->
/// environment variables -> on-disk defaults -> built-in defaults (expansion
/// §3.1 "Runtime config layering"), grounded in the teacher's
/// `resolve_effective_database_url_with_source` env-over-file precedence
/// idiom.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub spec_path: Option<PathBuf>,
    pub user_config_path: Option<PathBuf>,
    pub event_rules_path: Option<PathBuf>,
    pub enable_components: Vec<String>,
    pub ignore_components: Vec<String>,
    pub annotation_key: String,
    pub metrics_socket: PathBuf,
    pub cluster_name: Option<String>,
    pub spec_url_base: Option<String>,
    pub logging: LoggingConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    UserConfig(#[from] ConfigLoadError),
    #[error("no spec found: provide --spec, RIGWATCH_SPEC_URL, or a node default path")]
    NoSpec,
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl RuntimeConfig {
    /// Composes CLI args, environment variables, and built-in defaults.
    /// Every field always resolves to a value; provenance of non-default
    /// choices is logged at `info` (spec expansion §3.1).
    pub fn resolve(args: &RunArgs) -> Self {
        let cluster_name = args
            .cluster_name
            .clone()
            .or_else(|| env_non_empty("RIGWATCH_CLUSTER_NAME"))
            .or_else(default_cluster_name_from_hostname);
        let spec_url_base = env_non_empty("RIGWATCH_SPEC_URL");

        let logging = LoggingConfig {
            log_file: args.log_file.clone(),
            log_level: args.log_level.clone().unwrap_or_else(|| "info".to_string()),
            log_max_size_mb: args.log_max_size.unwrap_or(100),
            log_max_backups: args.log_max_backups.unwrap_or(5),
            log_max_age_days: args.log_max_age.unwrap_or(28),
            log_compress: args.log_compress,
            log_also_stdout: args.log_also_stdout || args.log_file.is_none(),
        };

        let config = Self {
            spec_path: args.spec.clone(),
            user_config_path: args.cfg.clone(),
            event_rules_path: args.event_rules.clone(),
            enable_components: args.enable_components.clone(),
            ignore_components: args.ignore_components.clone(),
            annotation_key: args
                .annotation_key
                .clone()
                .unwrap_or_else(|| "rigwatch/node-health".to_string()),
            metrics_socket: args
                .metrics_socket
                .clone()
                .unwrap_or_else(|| PathBuf::from("/var/run/rigwatch/metrics.sock")),
            cluster_name,
            spec_url_base,
            logging,
        };

        info!(
            spec_path = ?config.spec_path,
            cluster_name = ?config.cluster_name,
            metrics_socket = %config.metrics_socket.display(),
            "resolved runtime configuration",
        );
        config
    }

    /// Loads the Spec from the explicit path, falling back to the node
    /// default path. Downloading from `spec_url_base` over HTTP is an
    /// out-of-scope external collaborator (spec.md §1); this surfaces
    /// [`AppConfigError::NoSpec`] instead of performing the fetch.
    pub fn load_spec(&self) -> Result<Spec, AppConfigError> {
        if let Some(path) = &self.spec_path {
            return load_yaml_file(path, Spec::from_yaml);
        }
        let default_path = default_base_path().join("spec.yaml");
        if default_path.exists() {
            return load_yaml_file(&default_path, Spec::from_yaml);
        }
        Err(AppConfigError::NoSpec)
    }

    /// Per-subsystem `UserConfig` overrides. A missing file is not an error
    /// — callers fall back to `UserConfig::default()` per subsystem.
    pub fn load_user_configs(&self) -> Result<HashMap<String, UserConfig>, AppConfigError> {
        let path = self
            .user_config_path
            .clone()
            .unwrap_or_else(|| default_base_path().join("user-config.yaml"));
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| AppConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let raw: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(&contents)?;
        raw.into_iter()
            .map(|(name, value)| {
                let cfg: UserConfig = serde_yaml::from_value(value)?;
                cfg.validate().map_err(|e| AppConfigError::UserConfig(e.into()))?;
                Ok((name, cfg))
            })
            .collect()
    }

    pub fn load_event_rules(&self) -> Result<EventRuleFile, AppConfigError> {
        let path = self
            .event_rules_path
            .clone()
            .unwrap_or_else(|| default_base_path().join("event-rules.yaml"));
        if !path.exists() {
            return Ok(EventRuleFile::default());
        }
        load_yaml_file(&path, EventRuleFile::from_yaml)
    }

    /// Effective set of components to start: the enable list if given, else
    /// `defaults`, minus the ignore list (spec §4.G startup).
    pub fn selected_components(&self, defaults: &[&str]) -> Vec<String> {
        let base: Vec<String> = if self.enable_components.is_empty() {
            defaults.iter().map(|s| s.to_string()).collect()
        } else {
            self.enable_components.clone()
        };
        base.into_iter()
            .filter(|name| !self.ignore_components.contains(name))
            .collect()
    }
}

fn load_yaml_file<T>(path: &Path, parse: impl Fn(&str) -> Result<T, serde_yaml::Error>) -> Result<T, AppConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| AppConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&contents).map_err(AppConfigError::Yaml)
}

fn default_base_path() -> PathBuf {
    PathBuf::from("/etc/rigwatch/config")
}

/// `RIGWATCH_CLUSTER_NAME` falls back to a regex over the node's hostname
/// (spec §6 "Environment variables").
fn default_cluster_name_from_hostname() -> Option<String> {
    let hostname = hostname_string()?;
    let re = regex::Regex::new(r"^([a-zA-Z0-9]+)-").ok()?;
    re.captures(&hostname)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn hostname_string() -> Option<String> {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
