use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Per-node health-inspection daemon for GPU/HPC clusters (spec §6).
#[derive(Debug, Parser)]
#[command(name = "rigwatch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs the daemon in the foreground.
    Run(RunArgs),
}

/// Flags for the `run` subcommand (spec §6).
#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Path to the cluster spec YAML. Falls back to the node default path.
    #[arg(long)]
    pub spec: Option<PathBuf>,

    /// Path to per-subsystem user config overrides.
    #[arg(long)]
    pub cfg: Option<PathBuf>,

    /// Path to the event filter rule file.
    #[arg(long = "event-rules")]
    pub event_rules: Option<PathBuf>,

    /// Components to start; defaults to the built-in set when empty.
    #[arg(long = "enable-components", value_delimiter = ',')]
    pub enable_components: Vec<String>,

    /// Components to exclude even if enabled.
    #[arg(long = "ignore-components", value_delimiter = ',')]
    pub ignore_components: Vec<String>,

    /// Orchestrator annotation key used to publish node health.
    #[arg(long)]
    pub annotation_key: Option<String>,

    /// Unix socket path the metrics/health HTTP surface listens on.
    #[arg(long)]
    pub metrics_socket: Option<PathBuf>,

    /// Cluster name; defaults to a regex over the node's hostname.
    #[arg(long)]
    pub cluster_name: Option<String>,

    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long)]
    pub log_max_size: Option<u64>,

    #[arg(long)]
    pub log_max_backups: Option<u32>,

    #[arg(long)]
    pub log_max_age: Option<u32>,

    #[arg(long, default_value_t = false)]
    pub log_compress: bool,

    #[arg(long, default_value_t = false)]
    pub log_also_stdout: bool,
}
