//! Feed client with automatic reconnection
//!
//! Keeps one connection to the feed server open, forwards every payload to
//! the engine's inbound channel in arrival order and relays the engine's
//! outbound pass-through messages. Reconnects with a fixed interval until
//! the configured number of consecutive attempts is exhausted.

use crate::infrastructure::config::TransportConfig;
use crate::infrastructure::metrics::MetricsCollector;
use crate::ws::connection::{FeedConnection, WebSocketError};
use crate::{log_ws, FeedError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::Level;

/// Fixed-interval reconnection policy with an attempt budget
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    interval: Duration,
    failures: u32,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            failures: 0,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(
            config.reconnect_attempts,
            Duration::from_millis(config.reconnect_interval_ms),
        )
    }

    /// Register a failed or ended connection
    ///
    /// Returns the delay before the next attempt, or `None` once the budget
    /// of consecutive attempts is spent.
    pub fn record_failure(&mut self) -> Option<Duration> {
        if self.failures >= self.max_attempts {
            return None;
        }
        self.failures += 1;
        Some(self.interval)
    }

    /// Successful connection: restore the full budget
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

/// Why a connected session ended
#[derive(Debug)]
enum SessionEnd {
    /// Engine dropped its receiver; stop for good
    EngineGone,
    /// Server closed the connection
    Closed,
    Failed(WebSocketError),
}

enum Step {
    Frame(std::result::Result<Option<String>, WebSocketError>),
    Outbound(Option<String>),
}

/// Upstream transport feeding the aggregation engine
pub struct FeedClient {
    config: TransportConfig,
    metrics: Arc<MetricsCollector>,
}

impl FeedClient {
    pub fn new(config: TransportConfig, metrics: Arc<MetricsCollector>) -> Self {
        Self { config, metrics }
    }

    /// Run until the engine goes away or reconnection attempts run out
    pub async fn run(
        self,
        inbound: mpsc::Sender<String>,
        mut outbound: mpsc::Receiver<String>,
    ) -> Result<()> {
        let mut policy = ReconnectPolicy::from_config(&self.config);
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let mut outbound_open = true;
        let mut connected_once = false;

        loop {
            log_ws!(Level::INFO, url = %self.config.url, "Connecting to feed...");

            match FeedConnection::connect(&self.config.url, connect_timeout).await {
                Ok(mut conn) => {
                    policy.reset();
                    if connected_once {
                        self.metrics.record_reconnect();
                    }
                    connected_once = true;
                    self.metrics.set_connected(true);
                    log_ws!(Level::INFO, url = %conn.url(), "Feed connected");

                    let end = pump(&mut conn, &inbound, &mut outbound, &mut outbound_open).await;

                    self.metrics.set_connected(false);
                    let _ = conn.close().await;

                    match end {
                        SessionEnd::EngineGone => {
                            log_ws!(Level::INFO, "Engine stopped, closing feed connection");
                            return Ok(());
                        }
                        SessionEnd::Closed => {
                            log_ws!(Level::WARN, "Feed connection closed by server");
                        }
                        SessionEnd::Failed(e) => {
                            log_ws!(Level::ERROR, error = %e, "Feed connection failed");
                        }
                    }
                }
                Err(e) => {
                    log_ws!(Level::WARN, error = %e, "Feed connect attempt failed");
                }
            }

            if inbound.is_closed() {
                return Ok(());
            }

            match policy.record_failure() {
                Some(delay) => {
                    log_ws!(
                        Level::INFO,
                        attempt = policy.failures(),
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting"
                    );
                    sleep(delay).await;
                }
                None => {
                    return Err(FeedError::WebSocket(format!(
                        "giving up on {} after {} reconnect attempts",
                        self.config.url, self.config.reconnect_attempts
                    )));
                }
            }
        }
    }
}

/// Shuttle frames between one live connection and the engine channels
async fn pump(
    conn: &mut FeedConnection,
    inbound: &mpsc::Sender<String>,
    outbound: &mut mpsc::Receiver<String>,
    outbound_open: &mut bool,
) -> SessionEnd {
    loop {
        let step = tokio::select! {
            frame = conn.recv_text() => Step::Frame(frame),
            msg = outbound.recv(), if *outbound_open => Step::Outbound(msg),
        };

        match step {
            Step::Frame(Ok(Some(text))) => {
                if inbound.send(text).await.is_err() {
                    return SessionEnd::EngineGone;
                }
            }
            Step::Frame(Ok(None)) => return SessionEnd::Closed,
            Step::Frame(Err(e)) => return SessionEnd::Failed(e),
            Step::Outbound(Some(payload)) => {
                if let Err(e) = conn.send_text(&payload).await {
                    return SessionEnd::Failed(e);
                }
            }
            Step::Outbound(None) => {
                // Engine no longer sends; keep reading
                *outbound_open = false;
            }
        }
    }
}
