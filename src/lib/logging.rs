use anyhow::{Context, Result};
use std::env;
use std::io::IsTerminal;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directives, e.g. `debug` or `msort=trace`
pub const LOG_FILTER_ENV: &str = "MSORT_LOG";
/// Also write plain-text logs to this file
pub const LOG_FILE_ENV: &str = "MSORT_LOG_FILE";

/// Install the global subscriber. Terminal output goes to stderr so the
/// row listing on stdout stays clean. Keep the returned guard alive until
/// exit or buffered file lines are lost.
pub fn init_logger() -> Result<Option<WorkerGuard>> {
    let filter = env::var(LOG_FILTER_ENV).unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::try_new(&filter)
        .with_context(|| format!("Invalid {} filter '{}'", LOG_FILTER_ENV, filter))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_ansi(std::io::stderr().is_terminal());

    let (file_layer, guard) = match env::var(LOG_FILE_ENV) {
        Ok(log_file_path) if !log_file_path.trim().is_empty() => {
            let path = Path::new(&log_file_path);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path.file_name().context("Log file path has no file name")?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let file_appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(filter_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if guard.is_some() {
        info!("Logging to stderr and {}", env::var(LOG_FILE_ENV).unwrap_or_default());
    }

    Ok(guard)
}
