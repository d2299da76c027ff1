//! Market data types
//!
//! SourceState, the two opportunity records and SpreadMatrix are the
//! structures the engine keeps and hands out in snapshots.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Latest price of a single source with deltas against its previous value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceState {
    /// Latest known price
    pub price: f64,
    /// Price held before this update (equals `price` on first observation)
    pub previous_price: f64,
    /// `price - previous_price`
    pub change: f64,
    /// Percent change against `previous_price`, 0 when that is 0
    pub change_percent: f64,
    /// Engine wall-clock time of the update (Unix millis)
    pub last_update: u64,
}

impl SourceState {
    /// First observation of a source: zero delta
    #[inline]
    pub fn first(price: f64, now_ms: u64) -> Self {
        Self::derive(price, price, now_ms)
    }

    /// Derive the next state from the stored previous price
    #[inline]
    pub fn derive(previous_price: f64, price: f64, now_ms: u64) -> Self {
        let change = price - previous_price;
        Self {
            price,
            previous_price,
            change,
            change_percent: percent_change(change, previous_price),
            last_update: now_ms,
        }
    }

    /// Derive the state that follows `prior` (or a first observation)
    #[inline]
    pub fn next(prior: Option<&SourceState>, price: f64, now_ms: u64) -> Self {
        match prior {
            Some(prev) => Self::derive(prev.price, price, now_ms),
            None => Self::first(price, now_ms),
        }
    }
}

/// Percent change with division-by-zero guard
///
/// Never returns NaN or infinity.
#[inline]
pub fn percent_change(change: f64, previous_price: f64) -> f64 {
    if previous_price == 0.0 {
        return 0.0;
    }
    let pct = change / previous_price * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

/// Record kept in an opportunity buffer
pub trait Opportunity: Clone {
    /// Current identifier (empty when the producer did not send one)
    fn id(&self) -> &str;

    /// Assign an engine-generated identifier
    fn set_id(&mut self, id: String);
}

/// Cross-venue arbitrage signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    pub symbol: String,
    pub buy_source: String,
    pub sell_source: String,
    pub buy_price: f64,
    pub sell_price: f64,
    pub profit_pct: f64,
    /// Producer timestamp (Unix millis), informational only
    pub timestamp: i64,
}

/// Basis trade signal: buy on DeDust, short on a derivatives venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasisTradeOpportunity {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    pub symbol: String,
    pub dedust_price: f64,
    pub short_source: String,
    pub short_price: f64,
    pub profit_pct: f64,
    pub timestamp: i64,
}

/// Absent and `null` ids both decode as "", leaving assignment to the engine
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

macro_rules! impl_opportunity {
    ($ty:ty) => {
        impl Opportunity for $ty {
            #[inline]
            fn id(&self) -> &str {
                &self.id
            }

            #[inline]
            fn set_id(&mut self, id: String) {
                self.id = id;
            }
        }
    };
}

impl_opportunity!(ArbitrageOpportunity);
impl_opportunity!(BasisTradeOpportunity);

/// Pairwise spread percentages: row = buy source, column = sell source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpreadMatrix {
    pub spreads: BTreeMap<String, BTreeMap<String, f64>>,
}

impl SpreadMatrix {
    pub fn new(spreads: BTreeMap<String, BTreeMap<String, f64>>) -> Self {
        Self { spreads }
    }

    /// Spread of buying at `buy` and selling at `sell`
    ///
    /// Self-pairs carry no data and always return `None`.
    pub fn get(&self, buy: &str, sell: &str) -> Option<f64> {
        if buy == sell {
            return None;
        }
        self.spreads.get(buy).and_then(|row| row.get(sell)).copied()
    }

    /// Row sources in stable order
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.spreads.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.spreads.is_empty()
    }
}
