//! API Server (Cold Path)
//!
//! Read-only HTTP view of the latest published market snapshot, plus an
//! optional static dashboard directory.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::Level;

use crate::core::{ArbitrageOpportunity, BasisTradeOpportunity, SourceState, SpreadMatrix};
use crate::engine::MarketSnapshot;
use crate::infrastructure::config::ApiConfig;
use crate::infrastructure::metrics::{MetricsCollector, MetricsSnapshot};
use crate::{log_api, FeedError};

/// Connection and store summary
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDto {
    pub is_connected: bool,
    pub latency_ms: u64,
    pub active_sources: usize,
    pub arbitrage_count: usize,
    pub basis_trade_count: usize,
    pub has_spreads: bool,
    pub metrics: MetricsSnapshot,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub snapshots: watch::Receiver<Arc<MarketSnapshot>>,
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    pub fn new(
        snapshots: watch::Receiver<Arc<MarketSnapshot>>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self { snapshots, metrics }
    }

    /// Latest published snapshot
    fn latest(&self) -> Arc<MarketSnapshot> {
        self.snapshots.borrow().clone()
    }
}

/// Build the API router
pub fn router(state: AppState, static_path: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/prices", get(get_prices))
        .route("/api/opportunities/arbitrage", get(get_arbitrage))
        .route("/api/opportunities/basis", get(get_basis_trades))
        .route("/api/spreads", get(get_spreads))
        .route("/api/status", get(get_status));

    if let Some(path) = static_path {
        app = app.fallback_service(ServeDir::new(path));
    }

    app.layer(CorsLayer::permissive()).with_state(state)
}

/// Start the API server
pub async fn start_server(state: AppState, config: &ApiConfig) -> Result<(), FeedError> {
    let app = router(state, config.static_path.as_deref());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    log_api!(Level::INFO, "API Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Handler for /api/snapshot
async fn get_snapshot(State(state): State<AppState>) -> Json<MarketSnapshot> {
    Json(state.latest().as_ref().clone())
}

/// Handler for /api/prices
async fn get_prices(State(state): State<AppState>) -> Json<BTreeMap<String, SourceState>> {
    Json(state.latest().prices.clone())
}

/// Handler for /api/opportunities/arbitrage (newest first)
async fn get_arbitrage(State(state): State<AppState>) -> Json<Vec<ArbitrageOpportunity>> {
    Json(state.latest().arbitrage_opportunities.clone())
}

/// Handler for /api/opportunities/basis (newest first)
async fn get_basis_trades(State(state): State<AppState>) -> Json<Vec<BasisTradeOpportunity>> {
    Json(state.latest().basis_trade_opportunities.clone())
}

/// Handler for /api/spreads, `null` until the first matrix arrives
async fn get_spreads(State(state): State<AppState>) -> Json<Option<SpreadMatrix>> {
    Json(state.latest().spreads.clone())
}

/// Handler for /api/status
async fn get_status(State(state): State<AppState>) -> Json<StatusDto> {
    let snapshot = state.latest();

    Json(StatusDto {
        is_connected: state.metrics.is_connected(),
        latency_ms: state.metrics.latency_ms(),
        active_sources: snapshot.prices.len(),
        arbitrage_count: snapshot.arbitrage_opportunities.len(),
        basis_trade_count: snapshot.basis_trade_opportunities.len(),
        has_spreads: snapshot.spreads.is_some(),
        metrics: state.metrics.snapshot(),
    })
}
