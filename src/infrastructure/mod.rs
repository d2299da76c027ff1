//! Infrastructure - cold path only
//!
//! This module contains code outside the aggregation path:
//! - Logging and metrics
//! - Configuration management
//! - Snapshot API server

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;

pub use api::{start_server, AppState};
pub use config::{Config, ConfigError};
pub use logging::init_logging;
pub use metrics::MetricsCollector;
