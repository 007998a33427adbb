use std::fs;
use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, DEFAULT_LOG_FILTER};

const LOG_FILE_PREFIX: &str = "day-rater.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Route `tracing` events to a daily-rolling file under the data directory.
/// The terminal belongs to the TUI, so nothing is ever written to stdout.
pub fn init_tracing(config: &AppConfig) -> Result<()> {
    let log_dir = config.log_dir();
    fs::create_dir_all(&log_dir).context("failed to create log directory")?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let (filter, rejected) = resolve_filter(&config.log_filter);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(non_blocking)
        .try_init()
        .map_err(|err| anyhow!("failed to initialize logging: {err}"))?;

    if let Some(err) = rejected {
        tracing::warn!(
            filter = %config.log_filter,
            error = %err,
            fallback = DEFAULT_LOG_FILTER,
            "ignoring invalid log filter"
        );
    }
    Ok(())
}

/// Parse the configured filter, falling back to the default and handing the
/// parse error back so it can be logged once the subscriber is up.
fn resolve_filter(raw: &str) -> (EnvFilter, Option<ParseError>) {
    match EnvFilter::try_new(raw) {
        Ok(filter) => (filter, None),
        Err(err) => (EnvFilter::new(DEFAULT_LOG_FILTER), Some(err)),
    }
}
