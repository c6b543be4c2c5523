//! Tracing subscriber setup for the binary.
//!
//! Two layers are installed: a terminal layer on stderr filtered by
//! `RUST_LOG` (default `info`), and a file layer that records everything at
//! `debug` and above, including the captured output of every external
//! command. Stdout stays free for the results banner.

use std::sync::Mutex;

use camino::Utf8Path;
use cap_std::fs::OpenOptions;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::transport::open_parent;

/// Errors raised while installing the subscriber.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum LoggingError {
    /// Raised when the log file cannot be opened.
    #[error("failed to open log file {path}: {message}")]
    Open {
        /// Log file path.
        path: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a global subscriber is already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Installs the terminal and file layers. The log file is appended to.
///
/// # Errors
///
/// Returns [`LoggingError::Open`] when the log file cannot be opened and
/// [`LoggingError::Install`] when a subscriber is already set.
pub fn init_logging(log_file: &Utf8Path) -> Result<(), LoggingError> {
    let open_error = |message: String| LoggingError::Open {
        path: log_file.to_string(),
        message,
    };
    let (dir, name) = open_parent(log_file).map_err(|err| open_error(err.to_string()))?;
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    let file = dir
        .open_with(&name, &options)
        .map_err(|err| open_error(err.to_string()))?
        .into_std();

    let terminal_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let terminal = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(terminal_filter);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(terminal)
        .with(file_layer)
        .try_init()
        .map_err(|err| LoggingError::Install(err.to_string()))
}
