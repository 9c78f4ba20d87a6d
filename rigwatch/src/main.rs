use clap::Parser;
use tracing::error;

use rigwatch::cli::{Cli, Command};
use rigwatch::config::RuntimeConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Command::Run(args) = cli.command;
    let runtime_config = RuntimeConfig::resolve(&args);
    let _log_guard = rigwatch::logging::init(&runtime_config.logging);

    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    match rt.block_on(rigwatch::run(runtime_config)) {
        Ok(summary) => std::process::exit(rigwatch::exit_code_for_summary(&summary)),
        Err(err) => {
            error!(error = %err, "daemon failed to start");
            std::process::exit(rigwatch::EXIT_STARTUP_FAILURE);
        }
    }
}
