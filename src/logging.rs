//! Tracing subscriber setup.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use crate::config::ServerConfig;
use crate::error::ConfigError;

/// Log file name prefix inside `log_dir`.
const LOG_FILE_PREFIX: &str = "line-chat.log";

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
///
/// When `config.log_dir` is set, logs are also written to a daily rolling
/// file; keep the returned guard alive for the life of the process.
pub fn init(config: &ServerConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr.and(file_writer))
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
            Ok(None)
        }
    }
}
