//! Logging setup
//!
//! The TUI owns the terminal, so logs go to `spacelens.log` in the cache
//! directory unless stderr is requested explicitly.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "SPACELENS_LOG";
pub const LOG_FILE: &str = "spacelens.log";

/// Keeps the background writer alive; logs are flushed when it drops.
pub struct LogGuard {
    _guard: WorkerGuard,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber, writing to `<log_dir>/spacelens.log` or to stderr.
pub fn init(log_dir: &Path, to_stderr: bool) -> Result<LogGuard> {
    let (writer, guard) = if to_stderr {
        tracing_appender::non_blocking(std::io::stderr())
    } else {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, LOG_FILE))
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(to_stderr)
                .with_target(false)
                .with_writer(writer),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(LogGuard { _guard: guard })
}
