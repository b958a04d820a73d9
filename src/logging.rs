//! Operational logging built on `tracing`.
//!
//! One entry point, [`init`], selects a [`LogMode`]: stderr only for
//! embedded and one-shot hosts, or stderr plus a daily-rotated JSON file
//! for long-running ones. This channel is for operator diagnostics; audit
//! trace events never pass through it.

use std::io;
use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Where operational logs go.
#[derive(Debug, Clone, Copy)]
pub enum LogMode<'a> {
    /// Human-readable output on stderr only.
    Stderr,
    /// Stderr plus `nucleus.log.YYYY-MM-DD` JSON files under the directory.
    File(&'a Path),
}

/// Keeps the file writer flushing in the background.
///
/// Hold on to it for the life of the process; dropping it flushes and
/// closes the log file. In [`LogMode::Stderr`] there is nothing to hold.
#[must_use]
pub struct LogGuard(Option<WorkerGuard>);

/// Filter from `RUST_LOG`, falling back to `info`.
fn level_filter() -> EnvFilter {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(spec) => EnvFilter::new(spec),
        Err(_) => EnvFilter::new("info"),
    }
}

/// Install the global subscriber for the chosen mode.
///
/// # Errors
///
/// In [`LogMode::File`], fails when the log directory cannot be created.
pub fn init(mode: LogMode<'_>) -> anyhow::Result<LogGuard> {
    let stderr_layer = fmt::layer().with_writer(io::stderr);
    let registry = tracing_subscriber::registry()
        .with(level_filter())
        .with(stderr_layer);

    match mode {
        LogMode::Stderr => {
            registry.init();
            Ok(LogGuard(None))
        }
        LogMode::File(logs_dir) => {
            std::fs::create_dir_all(logs_dir)
                .with_context(|| format!("creating log directory {}", logs_dir.display()))?;
            let appender = tracing_appender::rolling::daily(logs_dir, "nucleus.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry.with(fmt::layer().json().with_writer(writer)).init();
            Ok(LogGuard(Some(guard)))
        }
    }
}
