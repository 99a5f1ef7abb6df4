//! Log dispatch for CLI runs: console on stderr plus an optional durable log file

use std::fs::{self, OpenOptions};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Mutex;

use tracing::Dispatch;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

use crate::cli::error::CliError;

/// Build a dispatch filtered by `RUST_LOG`, or `level` when it is unset.
/// When `log_file` is given, events are also appended to it as plain text.
pub fn build_dispatch(level: &str, log_file: Option<&Path>) -> Result<Dispatch, CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| CliError::InvalidArgument(format!("log level '{}': {}", level, e)))?;

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).map_err(|e| {
                    CliError::IoError(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| CliError::FileWriteError(path.to_path_buf(), e.to_string()))?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(console)
        .with(file_layer);
    Ok(Dispatch::new(subscriber))
}
