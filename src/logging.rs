//! Tracing setup: human-readable lines on stderr plus a plain-text copy in
//! the run's output directory.
//!
//! Filtering follows `RUST_LOG`, defaulting to `info`.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

pub const LOG_FILE_NAME: &str = "monitor_response_times.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("global tracing subscriber already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Keeps the non-blocking file writer alive. Dropping it flushes pending
/// lines and closes the file.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Installs the process-wide subscriber writing to stderr and to
/// `output_dir/monitor_response_times.log`.
pub fn init(output_dir: &Path) -> Result<LoggingGuard, LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (subscriber, guard) = build(output_dir, filter, true)?;
    subscriber.try_init()?;
    Ok(LoggingGuard { _guard: guard })
}

fn build(
    output_dir: &Path,
    filter: EnvFilter,
    console: bool,
) -> Result<(impl Subscriber + Send + Sync + 'static, WorkerGuard), LoggingError> {
    std::fs::create_dir_all(output_dir).map_err(|source| LoggingError::CreateDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let appender = tracing_appender::rolling::never(output_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_thread_names(true)
        .with_writer(writer);
    let console_layer = console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_names(true)
            .with_writer(io::stderr)
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer);
    Ok((subscriber, guard))
}
