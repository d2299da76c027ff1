//! Message envelope parser
//!
//! Every inbound payload is a JSON object with a `type` discriminator:
//!
//! ```text
//! {"type":"prices","prices":{"TONUSDT":{"binance_futures":5.12,"pyth":"5.11"}}}
//! {"type":"price_update","source":"binance_futures","price":5.13}
//! {"type":"arbitrage","opportunity":{...}}
//! {"type":"basis_trade","opportunity":{...}}
//! {"type":"spreads","spreads":{"binance_futures":{"okx_futures":0.08}}}
//! ```
//!
//! Classification happens on a `serde_json::Value` first so that invalid JSON,
//! unknown discriminators and malformed bodies map to distinct errors.

use super::ParseError;
use crate::core::{ArbitrageOpportunity, BasisTradeOpportunity, SpreadMatrix};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Inbound message discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Prices,
    PriceUpdate,
    Arbitrage,
    BasisTrade,
    Spreads,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Prices,
        EventKind::PriceUpdate,
        EventKind::Arbitrage,
        EventKind::BasisTrade,
        EventKind::Spreads,
    ];

    /// Wire tag of this kind
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::Prices => "prices",
            EventKind::PriceUpdate => "price_update",
            EventKind::Arbitrage => "arbitrage",
            EventKind::BasisTrade => "basis_trade",
            EventKind::Spreads => "spreads",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price as sent by the producer: JSON number or numeric string, finite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WirePrice(pub f64);

impl<'de> Deserialize<'de> for WirePrice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        let value = match Raw::deserialize(deserializer)? {
            Raw::Number(v) => v,
            Raw::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| D::Error::custom(format!("invalid price {s:?}")))?,
        };

        if !value.is_finite() {
            return Err(D::Error::custom("price is not finite"));
        }
        Ok(WirePrice(value))
    }
}

/// Bulk price snapshot: symbol → source → price
///
/// Rows stay undecoded until a symbol is looked up, so a malformed row for
/// one symbol never hides valid prices for another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkPrices {
    pub prices: BTreeMap<String, Value>,
}

impl BulkPrices {
    /// Per-source prices for one trading symbol
    ///
    /// A missing or `null` row is `Ok(None)`. A present row must be a map of
    /// source to price.
    pub fn for_symbol(&self, symbol: &str) -> Result<Option<BTreeMap<String, f64>>, ParseError> {
        let row = match self.prices.get(symbol) {
            None | Some(Value::Null) => return Ok(None),
            Some(row) => row,
        };

        let sources = BTreeMap::<String, WirePrice>::deserialize(row).map_err(|e| {
            ParseError::Shape {
                kind: EventKind::Prices,
                reason: format!("{symbol}: {e}"),
            }
        })?;

        Ok(Some(sources.into_iter().map(|(src, p)| (src, p.0)).collect()))
    }
}

/// Decoded inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Prices(BulkPrices),
    PriceUpdate { source: String, price: f64 },
    Arbitrage(ArbitrageOpportunity),
    BasisTrade(BasisTradeOpportunity),
    Spreads(SpreadMatrix),
}

impl FeedEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            FeedEvent::Prices(_) => EventKind::Prices,
            FeedEvent::PriceUpdate { .. } => EventKind::PriceUpdate,
            FeedEvent::Arbitrage(_) => EventKind::Arbitrage,
            FeedEvent::BasisTrade(_) => EventKind::BasisTrade,
            FeedEvent::Spreads(_) => EventKind::Spreads,
        }
    }
}

#[derive(Deserialize)]
struct PricesBody {
    prices: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct PriceUpdateBody {
    source: String,
    price: WirePrice,
}

#[derive(Deserialize)]
struct OpportunityBody<T> {
    opportunity: T,
}

/// `null` rows and cells carry no data and are dropped at decode
#[derive(Deserialize)]
struct SpreadsBody {
    spreads: BTreeMap<String, Option<BTreeMap<String, Option<f64>>>>,
}

/// Decode a raw payload into a typed event
pub fn parse_message(raw: &str) -> Result<FeedEvent, ParseError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let kind = classify(&value)?;

    let event = match kind {
        EventKind::Prices => {
            let body: PricesBody = decode(kind, value)?;
            FeedEvent::Prices(BulkPrices {
                prices: body.prices,
            })
        }
        EventKind::PriceUpdate => {
            let body: PriceUpdateBody = decode(kind, value)?;
            if body.source.is_empty() {
                return Err(ParseError::Shape {
                    kind,
                    reason: "empty `source`".to_string(),
                });
            }
            FeedEvent::PriceUpdate {
                source: body.source,
                price: body.price.0,
            }
        }
        EventKind::Arbitrage => {
            let body: OpportunityBody<ArbitrageOpportunity> = decode(kind, value)?;
            FeedEvent::Arbitrage(body.opportunity)
        }
        EventKind::BasisTrade => {
            let body: OpportunityBody<BasisTradeOpportunity> = decode(kind, value)?;
            FeedEvent::BasisTrade(body.opportunity)
        }
        EventKind::Spreads => {
            let body: SpreadsBody = decode(kind, value)?;
            let spreads = body
                .spreads
                .into_iter()
                .filter_map(|(buy, row)| {
                    let row = row?
                        .into_iter()
                        .filter_map(|(sell, cell)| cell.map(|v| (sell, v)))
                        .collect();
                    Some((buy, row))
                })
                .collect();
            FeedEvent::Spreads(SpreadMatrix::new(spreads))
        }
    };

    Ok(event)
}

/// Read the `type` discriminator
fn classify(value: &Value) -> Result<EventKind, ParseError> {
    let Value::Object(map) = value else {
        return Err(ParseError::NotAnObject);
    };

    match map.get("type") {
        None | Some(Value::Null) => Err(ParseError::MissingType),
        Some(Value::String(tag)) => {
            EventKind::from_tag(tag).ok_or_else(|| ParseError::UnknownType(tag.clone()))
        }
        Some(other) => Err(ParseError::UnknownType(other.to_string())),
    }
}

#[inline]
fn decode<T: DeserializeOwned>(kind: EventKind, value: Value) -> Result<T, ParseError> {
    serde_json::from_value(value).map_err(|e| ParseError::Shape {
        kind,
        reason: e.to_string(),
    })
}
