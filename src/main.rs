//! Real-time market-data feed client
//!
//! # Architecture
//! - **parsing**: Envelope decoding into typed feed events
//! - **hot_path**: Engine-owned stores (prices, opportunities, spreads)
//! - **engine**: Aggregation engine and snapshot publishing
//! - **ws**: Upstream WebSocket transport
//! - **infrastructure**: Cold path (logging, metrics, config, api)

use anyhow::Context;
use arb_feed::infrastructure::{init_logging, start_server, AppState, Config, MetricsCollector};
use arb_feed::ws::FeedClient;
use arb_feed::{log_main, AggregationEngine};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Level;

/// Outbound pass-through queue depth
const OUTBOUND_CAPACITY: usize = 64;

/// Main application
pub struct FeedApp {
    config: Config,
}

impl FeedApp {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Wire transport → engine → API and run until the feed ends or Ctrl-C
    pub async fn run(self) -> anyhow::Result<()> {
        log_main!(Level::INFO, "Starting market feed client...");

        // 1. Initialize Core Components
        let metrics = Arc::new(MetricsCollector::new());
        let mut engine = AggregationEngine::new(&self.config.feed, metrics.clone());

        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.transport.channel_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        engine.attach_outbound(outbound_tx);

        // 2. Start API Server (Cold Path)
        let api_state = AppState::new(engine.subscribe(), metrics.clone());
        let api_config = self.config.api.clone();
        tokio::spawn(async move {
            if let Err(e) = start_server(api_state, &api_config).await {
                tracing::error!("API Server failed: {}", e);
            }
        });

        // 3. Start transport
        let client = FeedClient::new(self.config.transport.clone(), metrics.clone());
        let transport = tokio::spawn(client.run(inbound_tx, outbound_rx));

        // 4. Drive the engine until the transport drops its sender
        tokio::select! {
            _ = engine.run(inbound_rx) => {}
            _ = tokio::signal::ctrl_c() => {
                log_main!(Level::INFO, "Shutdown requested");
                transport.abort();
                return Ok(());
            }
        }

        match transport.await {
            Ok(result) => result.context("feed transport stopped")?,
            Err(e) if e.is_cancelled() => {}
            Err(e) => return Err(e).context("feed transport task panicked"),
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    // Guards flush file appenders on drop
    let _guards = init_logging(&config.logging).context("failed to initialize logging")?;

    FeedApp::new(config).run().await
}
