//! Logging setup
//!
//! Human-readable logs go to stdout. When a log directory is configured, a
//! JSON copy is written to a daily rolling file as well. The filter comes
//! from `RUST_LOG` and defaults to `info`.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix for rolling log files
const LOG_FILE_PREFIX: &str = "orchestrator.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let stdout_layer = fmt::layer().with_target(false);

    let Some(dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(stdout_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;
        return Ok(None);
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer().json().with_ansi(false).with_writer(writer);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!("[Logging] Writing JSON logs to {}", dir.display());
    Ok(Some(guard))
}
