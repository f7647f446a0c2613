//! Leveled logging setup for the server binary.

use std::{fs::OpenOptions, path::Path};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::foundation::error::{DerivaError, DerivaResult};

/// `EnvFilter` directive for a numeric verbosity: 0 error, 1 warn, 2 info, 3 debug, 4+ trace.
pub fn filter_directive(level: u8) -> &'static str {
    match level {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    }
}

/// Filter for `level`, unless `RUST_LOG` is set.
pub fn env_filter(level: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive(level)))
}

/// Install the global subscriber. Logs go to `log_file` when it can be opened, stderr otherwise.
///
/// The returned guard flushes buffered lines on drop; keep it alive for the life of the process.
pub fn init_logging(level: u8, log_file: Option<&Path>) -> DerivaResult<WorkerGuard> {
    let mut file_error = None;
    let (writer, guard) = match log_file.map(|p| (p, open_append(p))) {
        Some((_, Ok(f))) => tracing_appender::non_blocking(f),
        Some((p, Err(e))) => {
            file_error = Some(format!("{}: {e}", p.display()));
            tracing_appender::non_blocking(std::io::stderr())
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt::layer().with_writer(writer).with_ansi(log_file.is_none()))
        .try_init()
        .map_err(|e| DerivaError::config_fatal(format!("install log subscriber: {e}")))?;

    if let Some(err) = file_error {
        tracing::warn!(error = %err, "cannot open log file, logging to stderr");
    }
    Ok(guard)
}

fn open_append(path: &Path) -> std::io::Result<std::fs::File> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
#[path = "../tests/unit/logging.rs"]
mod tests;
