//! Tracing setup for the CLI and the daemon.
//!
//! Every command logs to stderr, json or human-readable per the logging
//! config. The daemon additionally writes JSON lines to a daily-rolling
//! file under `.covenant/logs/`, since a detached process has no terminal
//! to read.

use std::fs;
use std::io;
use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::models::LoggingConfig;

/// Install the global subscriber. Returns the file writer guard when a log
/// directory is given; the caller must hold it for the life of the process
/// or buffered lines are lost.
///
/// `RUST_LOG` overrides the configured level. A log directory that cannot
/// be opened downgrades to stderr-only logging instead of failing the run.
pub fn init(config: &LoggingConfig, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::builder()
        .with_default_directive(level_of(&config.level).into())
        .from_env_lossy();

    let mut guard = None;
    let mut layers = Vec::new();

    if let Some((writer, file_guard)) = log_dir.and_then(file_writer) {
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed(),
        );
        guard = Some(file_guard);
    }

    layers.push(if config.format == "json" {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .boxed()
    });

    tracing_subscriber::registry().with(filter).with(layers).init();
    guard
}

/// Non-blocking daily-rolling writer under `dir`, or `None` with a notice
/// on stderr when the directory or file cannot be created.
fn file_writer(dir: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    if let Err(err) = fs::create_dir_all(dir) {
        eprintln!("log directory {} disabled: {err}", dir.display());
        return None;
    }
    match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("covenant.log")
        .build(dir)
    {
        Ok(appender) => Some(tracing_appender::non_blocking(appender)),
        Err(err) => {
            eprintln!("log file in {} disabled: {err}", dir.display());
            None
        }
    }
}

/// Configured default level. Config validation restricts the value already;
/// anything unrecognized falls back to info.
fn level_of(level: &str) -> Level {
    match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
