//! Centralized file-based logging system
//!
//! Writes logs to files under the configured directory, separated by log type:
//! - main/ - General application logs (JSON)
//! - error/ - Error and warning logs only
//! - ws/ - Upstream feed connection logs
//! - api/ - Snapshot API server logs
//! - engine/ - Aggregation engine logs (dropped payloads, applied events)

use crate::infrastructure::config::LoggingConfig;
use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log file families, one subdirectory each
pub const LOG_TYPES: [&str; 5] = ["main", "error", "ws", "api", "engine"];

/// Initialize centralized file logging
///
/// Creates the log directory tree and sets up file appenders for each log type.
/// Returns WorkerGuards which must be kept alive for the duration of the program.
pub fn init_logging(config: &LoggingConfig) -> io::Result<Vec<WorkerGuard>> {
    create_log_dirs(&config.dir)?;

    let mut guards = Vec::new();

    // Main log - all logs
    let (main_appender, main_guard) = create_appender(&config.dir, "main");
    guards.push(main_guard);

    // Error log - ERROR and WARN only
    let (error_appender, error_guard) = create_appender(&config.dir, "error");
    guards.push(error_guard);

    // WebSocket log - upstream transport
    let (ws_appender, ws_guard) = create_appender(&config.dir, "ws");
    guards.push(ws_guard);

    // API log - API server logs
    let (api_appender, api_guard) = create_appender(&config.dir, "api");
    guards.push(api_guard);

    // Engine log - aggregation
    let (engine_appender, engine_guard) = create_appender(&config.dir, "engine");
    guards.push(engine_guard);

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json();

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    let ws_layer = tracing_subscriber::fmt::layer()
        .with_writer(ws_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target().contains("ws") || metadata.target().contains("connection")
        }));

    let api_layer = tracing_subscriber::fmt::layer()
        .with_writer(api_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target().contains("api") || metadata.target().contains("server")
        }));

    let engine_layer = tracing_subscriber::fmt::layer()
        .with_writer(engine_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target().contains("engine") || metadata.target().contains("parsing")
        }));

    // Console layer for development
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(main_layer)
        .with(error_layer)
        .with(ws_layer)
        .with(api_layer)
        .with(engine_layer)
        .with(console_layer)
        .init();

    tracing::info!(
        "Logging system initialized. Log files in {} directory",
        config.dir.display()
    );

    Ok(guards)
}

/// Create the log root and one subdirectory per log type
pub fn create_log_dirs(root: &Path) -> io::Result<()> {
    for log_type in LOG_TYPES {
        fs::create_dir_all(root.join(log_type))?;
    }
    Ok(())
}

/// Create a rolling file appender
fn create_appender(root: &Path, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, root.join(name), name);

    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    (non_blocking, guard)
}

/// Log macro helpers for specific log types
#[macro_export]
macro_rules! log_ws {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "ws", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_api {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "api", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_engine {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "engine", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_main {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "main", $level, $($arg)+)
    };
}
