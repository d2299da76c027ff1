//! Metrics collection for system monitoring
//!
//! Lock-free metrics counters using atomic operations.
//! Updated by the engine and transport, exported via API.

use crate::parsing::{EventKind, ParseError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

/// System metrics collector
///
/// Thread-safe counters shared between transport, engine and API.
pub struct MetricsCollector {
    /// Payloads handed to the engine
    total_messages: AtomicU64,
    /// Applied events, indexed like `EventKind::ALL`
    applied: [AtomicU64; 5],
    /// Payloads that could not be classified
    parse_failures: AtomicU64,
    /// Recognised type with malformed body
    shape_failures: AtomicU64,
    /// Transport connection status (0 = disconnected, 1 = connected)
    connected: AtomicU64,
    /// Successful reconnections after the first connect
    reconnects: AtomicU64,
    /// Last message timestamp (Unix millis)
    last_message_time: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

/// Metrics snapshot for API export
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_messages: u64,
    pub prices_applied: u64,
    pub price_updates_applied: u64,
    pub arbitrage_applied: u64,
    pub basis_trades_applied: u64,
    pub spreads_applied: u64,
    pub parse_failures: u64,
    pub shape_failures: u64,
    pub connected: bool,
    pub reconnects: u64,
    pub message_rate: f64, // messages per second
    pub uptime_seconds: u64,
}

#[inline]
fn kind_index(kind: EventKind) -> usize {
    match kind {
        EventKind::Prices => 0,
        EventKind::PriceUpdate => 1,
        EventKind::Arbitrage => 2,
        EventKind::BasisTrade => 3,
        EventKind::Spreads => 4,
    }
}

impl MetricsCollector {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            total_messages: AtomicU64::new(0),
            applied: Default::default(),
            parse_failures: AtomicU64::new(0),
            shape_failures: AtomicU64::new(0),
            connected: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            last_message_time: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record an inbound payload (before decoding)
    #[inline]
    pub fn record_message(&self) {
        self.total_messages.fetch_add(1, Ordering::Relaxed);
        self.update_last_message_time();
    }

    /// Record a successfully applied event
    #[inline]
    pub fn record_applied(&self, kind: EventKind) {
        self.applied[kind_index(kind)].fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dropped payload
    #[inline]
    pub fn record_rejected(&self, err: &ParseError) {
        if err.is_shape() {
            self.shape_failures.fetch_add(1, Ordering::Relaxed);
        } else {
            self.parse_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Update last message timestamp
    #[inline]
    fn update_last_message_time(&self) {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.last_message_time.store(now, Ordering::Relaxed);
    }

    /// Set transport connection status
    pub fn set_connected(&self, connected: bool) {
        let value = if connected { 1 } else { 0 };
        self.connected.store(value, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_messages.load(Ordering::Relaxed);
        let applied = |kind| self.applied[kind_index(kind)].load(Ordering::Relaxed);

        let uptime = self.start_time.elapsed().as_secs();
        let rate = if uptime > 0 {
            total as f64 / uptime as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            total_messages: total,
            prices_applied: applied(EventKind::Prices),
            price_updates_applied: applied(EventKind::PriceUpdate),
            arbitrage_applied: applied(EventKind::Arbitrage),
            basis_trades_applied: applied(EventKind::BasisTrade),
            spreads_applied: applied(EventKind::Spreads),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            shape_failures: self.shape_failures.load(Ordering::Relaxed),
            connected: self.is_connected(),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            message_rate: rate,
            uptime_seconds: uptime,
        }
    }

    /// Check if the transport is connected
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed) != 0
    }

    /// Get latency estimate in milliseconds
    /// Returns time since last message, capped at 10000ms
    pub fn latency_ms(&self) -> u64 {
        let last = self.last_message_time.load(Ordering::Relaxed);
        if last == 0 {
            return 10000; // No messages yet
        }

        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        now.saturating_sub(last).min(10000)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
