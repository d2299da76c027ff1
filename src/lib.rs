//! Real-time market-data feed client
//!
//! Consumes a stream of price, opportunity and spread events and keeps a
//! queryable in-memory view of market state.

pub mod core;
pub mod engine;
pub mod hot_path;
pub mod infrastructure;
pub mod parsing;
pub mod ws;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use engine::{AggregationEngine, MarketSnapshot, Outcome};
pub use infrastructure::config::{ApiConfig, Config, FeedConfig, TransportConfig};
pub use parsing::ParseError;

use thiserror::Error;

/// Main error type for the feed client
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<infrastructure::config::ConfigError> for FeedError {
    fn from(err: infrastructure::config::ConfigError) -> Self {
        FeedError::Config(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, FeedError>;
