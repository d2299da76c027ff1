//! Test utilities: deterministic engine, manual clock and payload builders
//!
//! Engines built here use sequential ids ("1", "2", ...) so scenarios are
//! reproducible.

use crate::core::{ArbitrageOpportunity, Clock, SequentialIds};
use crate::engine::AggregationEngine;
use crate::infrastructure::config::FeedConfig;
use crate::infrastructure::metrics::MetricsCollector;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Clock whose time is set by the test
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self(Arc::new(AtomicU64::new(now_ms)))
    }

    pub fn set(&self, now_ms: u64) {
        self.0.store(now_ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Engine with default config (symbol TONUSDT), sequential ids and a manual clock
pub fn test_engine() -> (AggregationEngine, ManualClock) {
    let clock = ManualClock::new(1_000);
    let engine = AggregationEngine::with_parts(
        &FeedConfig::default(),
        Box::new(SequentialIds::new()),
        Box::new(clock.clone()),
        Arc::new(MetricsCollector::new()),
    );
    (engine, clock)
}

/// Arbitrage record with the given id ("" = let the engine assign one)
pub fn arbitrage(id: &str) -> ArbitrageOpportunity {
    ArbitrageOpportunity {
        id: id.to_string(),
        symbol: "TONUSDT".to_string(),
        buy_source: "pyth".to_string(),
        sell_source: "binance_futures".to_string(),
        buy_price: 5.0,
        sell_price: 5.05,
        profit_pct: 1.0,
        timestamp: 1_700_000_000_000,
    }
}

pub fn price_update_msg(source: &str, price: f64) -> String {
    json!({"type": "price_update", "source": source, "price": price}).to_string()
}

/// Bulk `prices` message from (symbol, source, price) triples
pub fn bulk_prices_msg(entries: &[(&str, &str, f64)]) -> String {
    let mut prices: Map<String, Value> = Map::new();
    for (symbol, source, price) in entries {
        let row = prices
            .entry(symbol.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(row) = row {
            row.insert(source.to_string(), json!(price));
        }
    }
    json!({"type": "prices", "prices": prices}).to_string()
}

pub fn arbitrage_msg(id: Option<&str>, profit_pct: f64) -> String {
    let mut opportunity = json!({
        "symbol": "TONUSDT",
        "buy_source": "pyth",
        "sell_source": "okx_futures",
        "buy_price": 5.0,
        "sell_price": 5.1,
        "profit_pct": profit_pct,
        "timestamp": 1_700_000_000_000_i64,
    });
    if let Some(id) = id {
        opportunity["id"] = json!(id);
    }
    json!({"type": "arbitrage", "opportunity": opportunity}).to_string()
}

pub fn basis_msg(id: Option<&str>, profit_pct: f64) -> String {
    let mut opportunity = json!({
        "symbol": "TONUSDT",
        "dedust_price": 5.0,
        "short_source": "binance_futures",
        "short_price": 5.06,
        "profit_pct": profit_pct,
        "timestamp": 1_700_000_000_000_i64,
    });
    if let Some(id) = id {
        opportunity["id"] = json!(id);
    }
    json!({"type": "basis_trade", "opportunity": opportunity}).to_string()
}

/// `spreads` message from (buy, sell, spread) triples
pub fn spreads_msg(cells: &[(&str, &str, f64)]) -> String {
    let mut spreads: Map<String, Value> = Map::new();
    for (buy, sell, value) in cells {
        let row = spreads
            .entry(buy.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(row) = row {
            row.insert(sell.to_string(), json!(value));
        }
    }
    json!({"type": "spreads", "spreads": spreads}).to_string()
}
