//! Configuration management for the feed client
//!
//! Loads configuration from config.toml at startup.
//! Trading symbol, buffer capacities and transport policy are configurable
//! rather than hardcoded.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Feed client configuration
///
/// Loaded from config.toml at startup. Every section falls back to its
/// defaults when omitted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Aggregation engine settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Upstream WebSocket settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Snapshot API server settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the engine assigns ids to opportunities that arrive without one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// `<millis>-<uuid>`
    #[default]
    Random,
    /// Monotonic counter starting at 1
    Sequential,
}

/// Aggregation engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    /// Symbol key read from bulk `prices` messages
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Max arbitrage opportunities kept
    #[serde(default = "default_capacity")]
    pub arbitrage_capacity: usize,

    /// Max basis-trade opportunities kept
    #[serde(default = "default_capacity")]
    pub basis_trade_capacity: usize,

    #[serde(default)]
    pub id_strategy: IdStrategy,
}

/// Upstream WebSocket configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Feed endpoint (ws:// or wss://)
    #[serde(default = "default_url")]
    pub url: String,

    /// Consecutive failed connection attempts before giving up
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    /// Fixed delay between reconnection attempts
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Inbound queue between transport and engine
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Port for HTTP API server
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Optional dashboard directory served as fallback
    #[serde(default)]
    pub static_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Root directory for rolling log files
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// Filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            arbitrage_capacity: default_capacity(),
            basis_trade_capacity: default_capacity(),
            id_strategy: IdStrategy::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            static_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

fn default_symbol() -> String {
    "TONUSDT".to_string()
}

fn default_capacity() -> usize {
    50
}

fn default_url() -> String {
    "ws://127.0.0.1:8082/ws".to_string()
}

fn default_reconnect_attempts() -> u32 {
    20
}

fn default_reconnect_interval_ms() -> u64 {
    3_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_api_port() -> u16 {
    5000
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from config.toml file
    ///
    /// Path can be overridden with `CONFIG_PATH`.
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if file exists but cannot be parsed, or fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File not found - use defaults
                Ok(Config::default())
            }
            Err(e) => Err(ConfigError::IoError(e)),
        }
    }

    /// Parse and validate TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine or transport cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("feed.symbol is empty".into()));
        }
        if self.feed.arbitrage_capacity == 0 || self.feed.basis_trade_capacity == 0 {
            return Err(ConfigError::Invalid(
                "opportunity buffer capacities must be at least 1".into(),
            ));
        }
        if self.transport.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "transport.channel_capacity must be at least 1".into(),
            ));
        }
        self.transport.endpoint()?;
        Ok(())
    }
}

impl TransportConfig {
    /// Parsed feed endpoint, ws:// or wss:// only
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.url)
            .map_err(|e| ConfigError::Invalid(format!("transport.url: {}", e)))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(ConfigError::Invalid(format!(
                "transport.url: unsupported scheme {:?}",
                other
            ))),
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading file
    IoError(std::io::Error),
    /// Parse error (invalid TOML)
    ParseError(String),
    /// Parsed but unusable value
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::ParseError(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(e) => write!(f, "Invalid config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError(e) => Some(e),
            ConfigError::ParseError(_) | ConfigError::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.feed.symbol, "TONUSDT");
        assert_eq!(config.feed.arbitrage_capacity, 50);
        assert_eq!(config.feed.basis_trade_capacity, 50);
        assert_eq!(config.feed.id_strategy, IdStrategy::Random);
        assert_eq!(config.transport.reconnect_attempts, 20);
        assert_eq!(config.transport.reconnect_interval_ms, 3_000);
        assert_eq!(config.api.port, 5000);
        assert!(config.api.static_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [feed]
            symbol = "BTCUSDT"
            id_strategy = "sequential"

            [transport]
            url = "wss://feed.example.com/ws"
            "#,
        )
        .unwrap();

        assert_eq!(config.feed.symbol, "BTCUSDT");
        assert_eq!(config.feed.id_strategy, IdStrategy::Sequential);
        assert_eq!(config.feed.arbitrage_capacity, 50);
        assert_eq!(config.transport.endpoint().unwrap().host_str(), Some("feed.example.com"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero_cap = Config::from_toml("[feed]\narbitrage_capacity = 0\n");
        assert!(matches!(zero_cap, Err(ConfigError::Invalid(_))));

        let http = Config::from_toml("[transport]\nurl = \"http://example.com\"\n");
        assert!(matches!(http, Err(ConfigError::Invalid(_))));

        let garbage = Config::from_toml("[feed\n");
        assert!(matches!(garbage, Err(ConfigError::ParseError(_))));
    }
}
