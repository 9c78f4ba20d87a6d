use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Initializes the global tracing subscriber from [`LoggingConfig`], in the
/// same `registry().with(EnvFilter).with(fmt::layer()).init()` shape the
/// teacher's own server entry point uses. `RUST_LOG` overrides
/// `log_level` when set, matching `EnvFilter::try_from_default_env`'s
/// fallback idiom.
///
/// Returns the appender's `WorkerGuard` when file logging is enabled; the
/// caller must keep it alive for the process lifetime or buffered lines are
/// lost on exit.
pub fn init(config: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match &config.log_file {
        Some(path) => {
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
            let filename = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "rigwatch.log".to_string());
            // Daily rolling is the only rotation this binary performs; the
            // size/backup-count/age/compress knobs in LoggingConfig are
            // accepted but not applied here (see its doc comment).
            let file_appender = tracing_appender::rolling::daily(directory, filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            if config.log_also_stdout {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
                    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
                    .init();
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
                    .init();
            }
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            None
        }
    }
}
