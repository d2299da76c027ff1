//! Aggregation Engine
//!
//! Single entry point for inbound feed payloads. Decodes each payload, routes
//! it to the store its discriminator maps to, and republishes a consistent
//! snapshot to subscribers.
//!
//! The engine is exclusively owned and mutated through `&mut self`; one task
//! drives it, so messages are applied strictly in arrival order.

use crate::core::{
    ArbitrageOpportunity, BasisTradeOpportunity, Clock, IdGenerator, RandomIds, SequentialIds,
    SourceState, SpreadMatrix, SystemClock,
};
use crate::hot_path::{OpportunityBuffer, PriceStore, SpreadMatrixStore};
use crate::infrastructure::config::{FeedConfig, IdStrategy};
use crate::infrastructure::metrics::MetricsCollector;
use crate::parsing::{parse_message, EventKind, FeedEvent, ParseError};
use crate::{log_engine, FeedError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::Level;

/// Point-in-time view of every store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub prices: BTreeMap<String, SourceState>,
    /// Newest first
    pub arbitrage_opportunities: Vec<ArbitrageOpportunity>,
    /// Newest first
    pub basis_trade_opportunities: Vec<BasisTradeOpportunity>,
    /// `None` until the first `spreads` message
    pub spreads: Option<SpreadMatrix>,
}

/// Result of handing one payload to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Decoded and applied to the matching store
    Applied(EventKind),
    /// Rejected at the parse boundary; no store was touched
    Skipped(ParseError),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }
}

/// Streaming state-aggregation engine
pub struct AggregationEngine {
    symbol: String,
    prices: PriceStore,
    arbitrage: OpportunityBuffer<ArbitrageOpportunity>,
    basis_trades: OpportunityBuffer<BasisTradeOpportunity>,
    spreads: SpreadMatrixStore,
    ids: Box<dyn IdGenerator>,
    clock: Box<dyn Clock>,
    /// Last timestamp handed to a store; the clock never goes below it
    last_tick_ms: u64,
    publisher: watch::Sender<Arc<MarketSnapshot>>,
    outbound: Option<mpsc::Sender<String>>,
    metrics: Arc<MetricsCollector>,
}

impl AggregationEngine {
    /// Create engine with system clock and the configured id strategy
    pub fn new(config: &FeedConfig, metrics: Arc<MetricsCollector>) -> Self {
        let ids: Box<dyn IdGenerator> = match config.id_strategy {
            IdStrategy::Random => Box::new(RandomIds::new()),
            IdStrategy::Sequential => Box::new(SequentialIds::new()),
        };
        Self::with_parts(config, ids, Box::new(SystemClock), metrics)
    }

    /// Create engine with injected id generator and clock
    pub fn with_parts(
        config: &FeedConfig,
        ids: Box<dyn IdGenerator>,
        clock: Box<dyn Clock>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let (publisher, _) = watch::channel(Arc::new(MarketSnapshot::default()));
        Self {
            symbol: config.symbol.clone(),
            prices: PriceStore::new(),
            arbitrage: OpportunityBuffer::new(config.arbitrage_capacity),
            basis_trades: OpportunityBuffer::new(config.basis_trade_capacity),
            spreads: SpreadMatrixStore::new(),
            ids,
            clock,
            last_tick_ms: 0,
            publisher,
            outbound: None,
            metrics,
        }
    }

    /// Receiver of every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<MarketSnapshot>> {
        self.publisher.subscribe()
    }

    /// Connect the pass-through channel to the transport
    pub fn attach_outbound(&mut self, outbound: mpsc::Sender<String>) {
        self.outbound = Some(outbound);
    }

    /// Get metrics collector reference
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Trading symbol read from bulk `prices` messages
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Handle one raw transport payload
    ///
    /// Never fails: malformed input is logged, counted and skipped without
    /// touching any store.
    pub fn on_message(&mut self, raw: &str) -> Outcome {
        self.metrics.record_message();

        match parse_message(raw).and_then(|event| self.apply(event)) {
            Ok(kind) => {
                self.metrics.record_applied(kind);
                self.publish();
                Outcome::Applied(kind)
            }
            Err(err) => {
                log_engine!(Level::WARN, error = %err, "Dropping feed message");
                self.metrics.record_rejected(&err);
                Outcome::Skipped(err)
            }
        }
    }

    /// Route a decoded event to its store
    ///
    /// Fails only when the configured symbol's bulk row is malformed; no
    /// store is touched in that case.
    pub fn apply(&mut self, event: FeedEvent) -> std::result::Result<EventKind, ParseError> {
        let kind = event.kind();
        match event {
            FeedEvent::Prices(bulk) => {
                let row = bulk.for_symbol(&self.symbol)?;
                let now = self.tick();
                match row {
                    Some(sources) => {
                        let applied = self
                            .prices
                            .apply_bulk(sources.iter().map(|(s, p)| (s.as_str(), *p)), now);
                        log_engine!(Level::DEBUG, sources = applied, "Bulk prices applied");
                    }
                    None => {
                        log_engine!(
                            Level::DEBUG,
                            symbol = %self.symbol,
                            "Bulk prices without configured symbol"
                        );
                    }
                }
            }
            FeedEvent::PriceUpdate { source, price } => {
                let now = self.tick();
                let state = self.prices.apply_single(&source, price, now);
                log_engine!(
                    Level::TRACE,
                    %source,
                    price,
                    change_pct = state.change_percent,
                    "Price updated"
                );
            }
            FeedEvent::Arbitrage(opp) => {
                let id = self.arbitrage.push(opp, self.ids.as_mut());
                if let Some(opp) = self.arbitrage.latest() {
                    log_engine!(
                        Level::INFO,
                        %id,
                        "ARBITRAGE: {} {:.4}% Buy {} Sell {}",
                        opp.symbol,
                        opp.profit_pct,
                        opp.buy_source,
                        opp.sell_source
                    );
                }
            }
            FeedEvent::BasisTrade(opp) => {
                let id = self.basis_trades.push(opp, self.ids.as_mut());
                if let Some(opp) = self.basis_trades.latest() {
                    log_engine!(
                        Level::INFO,
                        %id,
                        "BASIS: {} {:.4}% DeDust {} Short {} @ {}",
                        opp.symbol,
                        opp.profit_pct,
                        opp.dedust_price,
                        opp.short_source,
                        opp.short_price
                    );
                }
            }
            FeedEvent::Spreads(matrix) => {
                self.spreads.replace(matrix);
            }
        }
        Ok(kind)
    }

    /// Current wall-clock time, clamped so it never moves backwards
    fn tick(&mut self) -> u64 {
        let now = self.clock.now_ms().max(self.last_tick_ms);
        self.last_tick_ms = now;
        now
    }

    /// Build a snapshot of all stores
    pub fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            prices: self.prices.snapshot(),
            arbitrage_opportunities: self.arbitrage.snapshot(),
            basis_trade_opportunities: self.basis_trades.snapshot(),
            spreads: self.spreads.snapshot(),
        }
    }

    fn publish(&self) {
        // send_replace succeeds with or without live receivers
        self.publisher.send_replace(Arc::new(self.snapshot()));
    }

    pub fn prices(&self) -> &PriceStore {
        &self.prices
    }

    pub fn arbitrage(&self) -> &OpportunityBuffer<ArbitrageOpportunity> {
        &self.arbitrage
    }

    pub fn basis_trades(&self) -> &OpportunityBuffer<BasisTradeOpportunity> {
        &self.basis_trades
    }

    pub fn spreads(&self) -> &SpreadMatrixStore {
        &self.spreads
    }

    /// Forward an opaque payload to the transport
    pub async fn send(&self, payload: impl Into<String>) -> Result<()> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| FeedError::Channel("outbound transport not attached".into()))?;
        outbound
            .send(payload.into())
            .await
            .map_err(|_| FeedError::Channel("transport closed".into()))
    }

    /// Serialize and forward a JSON payload to the transport
    pub async fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let payload =
            serde_json::to_string(value).map_err(|e| FeedError::Channel(e.to_string()))?;
        self.send(payload).await
    }

    /// Drain the inbound channel until the transport drops its sender
    ///
    /// Consumes the engine; all stores are released together on return.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<String>) {
        log_engine!(Level::INFO, symbol = %self.symbol, "Engine running. Processing messages...");

        while let Some(raw) = inbound.recv().await {
            self.on_message(&raw);
        }

        log_engine!(Level::INFO, "Inbound feed closed, engine stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        arbitrage_msg, basis_msg, bulk_prices_msg, price_update_msg, spreads_msg, test_engine,
        ManualClock,
    };

    #[test]
    fn test_price_update_scenario() {
        let (mut engine, clock) = test_engine();

        clock.set(1_000);
        assert_eq!(
            engine.on_message(&price_update_msg("binance_futures", 100.0)),
            Outcome::Applied(EventKind::PriceUpdate)
        );
        assert_eq!(
            engine.prices().get("binance_futures"),
            Some(&SourceState {
                price: 100.0,
                previous_price: 100.0,
                change: 0.0,
                change_percent: 0.0,
                last_update: 1_000,
            })
        );

        clock.set(2_000);
        engine.on_message(&price_update_msg("binance_futures", 101.0));
        let state = *engine.prices().get("binance_futures").unwrap();
        assert_eq!(state.price, 101.0);
        assert_eq!(state.previous_price, 100.0);
        assert_eq!(state.change, 1.0);
        assert!((state.change_percent - 1.0).abs() < 1e-12);
        assert_eq!(state.last_update, 2_000);

        engine.on_message(&price_update_msg("x", 0.0));
        let x = engine.prices().get("x").unwrap();
        assert_eq!(
            (x.price, x.previous_price, x.change, x.change_percent),
            (0.0, 0.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_bulk_prices_use_configured_symbol() {
        let (mut engine, _clock) = test_engine();
        engine.on_message(&price_update_msg("okx_futures", 5.0));

        let outcome = engine.on_message(&bulk_prices_msg(&[
            ("TONUSDT", "okx_futures", 5.5),
            ("TONUSDT", "pyth", 5.4),
            ("BTCUSDT", "okx_futures", 97_000.0),
        ]));
        assert_eq!(outcome, Outcome::Applied(EventKind::Prices));

        let okx = engine.prices().get("okx_futures").unwrap();
        assert_eq!(okx.previous_price, 5.0);
        assert_eq!(okx.price, 5.5);
        assert_eq!(engine.prices().get("pyth").unwrap().change, 0.0);
        assert_eq!(engine.prices().len(), 2);
    }

    #[test]
    fn test_bulk_without_symbol_is_noop() {
        let (mut engine, _clock) = test_engine();
        engine.on_message(&price_update_msg("pyth", 5.0));
        let before = engine.snapshot();

        let outcome = engine.on_message(&bulk_prices_msg(&[("BTCUSDT", "pyth", 1.0)]));
        assert!(outcome.is_applied());
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn test_bulk_ignores_other_symbols_rows() {
        let (mut engine, _clock) = test_engine();

        let bad_sibling = r#"{"type":"prices","prices":{"TONUSDT":{"binance_futures":5.1},"BTCUSDT":{"okx_futures":"n/a"}}}"#;
        assert_eq!(
            engine.on_message(bad_sibling),
            Outcome::Applied(EventKind::Prices)
        );
        assert_eq!(engine.prices().get("binance_futures").unwrap().price, 5.1);

        let scalar_sibling = r#"{"type":"prices","prices":{"TONUSDT":{"pyth":5.2},"meta":7}}"#;
        assert!(engine.on_message(scalar_sibling).is_applied());
        assert_eq!(engine.prices().get("pyth").unwrap().price, 5.2);
    }

    #[test]
    fn test_bulk_null_symbol_row_is_noop() {
        let (mut engine, _clock) = test_engine();
        engine.on_message(&price_update_msg("pyth", 5.0));
        let before = engine.snapshot();

        let outcome = engine.on_message(r#"{"type":"prices","prices":{"TONUSDT":null}}"#);
        assert!(outcome.is_applied());
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn test_bulk_malformed_symbol_row_skipped() {
        let (mut engine, _clock) = test_engine();
        engine.on_message(&price_update_msg("pyth", 5.0));
        let before = engine.snapshot();

        let outcome =
            engine.on_message(r#"{"type":"prices","prices":{"TONUSDT":{"pyth":"n/a"}}}"#);
        assert!(matches!(
            outcome,
            Outcome::Skipped(ParseError::Shape { kind: EventKind::Prices, .. })
        ));
        assert_eq!(engine.snapshot(), before);
        assert_eq!(engine.metrics().snapshot().shape_failures, 1);
    }

    #[test]
    fn test_spreads_null_cell_replaces_matrix() {
        let (mut engine, _clock) = test_engine();
        engine.on_message(&spreads_msg(&[("a", "b", 0.3)]));

        let outcome = engine.on_message(r#"{"type":"spreads","spreads":{"a":{"c":0.2,"b":null}}}"#);
        assert!(outcome.is_applied());

        let current = engine.spreads().current().unwrap();
        assert_eq!(current.get("a", "c"), Some(0.2));
        assert_eq!(current.get("a", "b"), None);
    }

    #[test]
    fn test_null_opportunity_id_gets_assigned() {
        let (mut engine, _clock) = test_engine();
        let raw = r#"{"type":"arbitrage","opportunity":{"id":null,"symbol":"TONUSDT","buy_source":"pyth","sell_source":"okx_futures","buy_price":5.0,"sell_price":5.1,"profit_pct":2.0,"timestamp":1}}"#;

        assert!(engine.on_message(raw).is_applied());
        assert_eq!(engine.arbitrage().len(), 1);
        assert_eq!(engine.arbitrage().latest().unwrap().id, "1");
    }

    #[test]
    fn test_last_update_never_decreases() {
        let (mut engine, clock) = test_engine();
        clock.set(5_000);
        engine.on_message(&price_update_msg("a", 1.0));

        // Wall clock jumps backwards
        clock.set(4_000);
        engine.on_message(&price_update_msg("a", 2.0));
        assert_eq!(engine.prices().get("a").unwrap().last_update, 5_000);
    }

    #[test]
    fn test_opportunities_newest_first_with_capacity() {
        let (mut engine, _clock) = test_engine();
        for i in 1..=51 {
            engine.on_message(&arbitrage_msg(None, i as f64));
        }

        let ids: Vec<String> = engine.arbitrage().iter().map(|o| o.id.clone()).collect();
        let expected: Vec<String> = (2..=51).rev().map(|i: u32| i.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_ids_unique_across_buffers() {
        let (mut engine, _clock) = test_engine();
        engine.on_message(&arbitrage_msg(None, 1.0));
        engine.on_message(&basis_msg(None, 1.0));
        engine.on_message(&arbitrage_msg(Some("upstream"), 1.0));

        assert_eq!(engine.arbitrage().latest().unwrap().id, "upstream");
        assert_eq!(engine.basis_trades().latest().unwrap().id, "2");
        assert_eq!(engine.arbitrage().iter().nth(1).unwrap().id, "1");
    }

    #[test]
    fn test_spreads_replace_not_merge() {
        let (mut engine, _clock) = test_engine();
        assert!(engine.snapshot().spreads.is_none());

        engine.on_message(&spreads_msg(&[("a", "b", 0.3)]));
        assert_eq!(engine.spreads().current().unwrap().get("a", "b"), Some(0.3));

        engine.on_message(&spreads_msg(&[]));
        let current = engine.spreads().current().unwrap();
        assert!(current.is_empty());
        assert_eq!(current.get("a", "b"), None);
    }

    #[test]
    fn test_malformed_payload_leaves_stores_unchanged() {
        let (mut engine, _clock) = test_engine();
        engine.on_message(&price_update_msg("a", 1.0));
        engine.on_message(&arbitrage_msg(None, 1.0));
        engine.on_message(&basis_msg(None, 1.0));
        engine.on_message(&spreads_msg(&[("a", "b", 0.1)]));
        let before = engine.snapshot();

        let bad = [
            r#"{"type":"price_update"}"#,
            r#"{"type":"price_update","source":"a"}"#,
            r#"{"type":"arbitrage","opportunity":{}}"#,
            r#"{"type":"spreads","spreads":[]}"#,
            r#"{"type":"unknown"}"#,
            "not json at all",
        ];
        for raw in bad {
            assert!(matches!(engine.on_message(raw), Outcome::Skipped(_)));
        }

        assert_eq!(engine.snapshot(), before);
        let metrics = engine.metrics().snapshot();
        assert_eq!(metrics.shape_failures, 4);
        assert_eq!(metrics.parse_failures, 2);
    }

    #[test]
    fn test_subscribers_receive_snapshots() {
        let (mut engine, _clock) = test_engine();
        let mut rx = engine.subscribe();
        assert!(!rx.has_changed().unwrap());

        engine.on_message(&price_update_msg("a", 1.0));
        assert!(rx.has_changed().unwrap());
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.prices.len(), 1);

        engine.on_message("garbage");
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let (mut engine, _clock) = test_engine();
        engine.on_message(&basis_msg(None, 0.5));

        let json = serde_json::to_value(engine.snapshot()).unwrap();
        assert!(json["prices"].as_object().unwrap().is_empty());
        assert_eq!(json["arbitrageOpportunities"].as_array().unwrap().len(), 0);
        assert_eq!(json["basisTradeOpportunities"][0]["id"], "1");
        assert!(json["spreads"].is_null());
    }

    #[test]
    fn test_with_custom_capacity() {
        let config = FeedConfig {
            arbitrage_capacity: 2,
            ..FeedConfig::default()
        };
        let mut engine = AggregationEngine::with_parts(
            &config,
            Box::new(SequentialIds::new()),
            Box::new(ManualClock::new(0)),
            Arc::new(MetricsCollector::new()),
        );
        for _ in 0..5 {
            engine.on_message(&arbitrage_msg(None, 1.0));
        }
        assert_eq!(engine.arbitrage().len(), 2);
        assert_eq!(engine.basis_trades().capacity(), 50);
    }

    #[tokio::test]
    async fn test_send_passthrough() {
        let (mut engine, _clock) = test_engine();
        assert!(matches!(
            engine.send("ping").await,
            Err(FeedError::Channel(_))
        ));

        let (tx, mut rx) = mpsc::channel(4);
        engine.attach_outbound(tx);
        engine.send("{\"op\":\"subscribe\"}").await.unwrap();
        engine
            .send_json(&serde_json::json!({"op": "ping"}))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), "{\"op\":\"subscribe\"}");
        assert_eq!(rx.recv().await.unwrap(), "{\"op\":\"ping\"}");
    }

    #[tokio::test]
    async fn test_run_processes_in_arrival_order() {
        let (engine, _clock) = test_engine();
        let mut snapshots = engine.subscribe();
        let (tx, rx) = mpsc::channel(8);

        tx.send(price_update_msg("a", 10.0)).await.unwrap();
        tx.send("{broken".to_string()).await.unwrap();
        tx.send(price_update_msg("a", 12.0)).await.unwrap();
        drop(tx);

        engine.run(rx).await;

        let last = snapshots.borrow_and_update().clone();
        let a = last.prices.get("a").unwrap();
        assert_eq!(a.previous_price, 10.0);
        assert_eq!(a.price, 12.0);
    }
}
