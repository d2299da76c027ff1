//! Core types for the aggregation engine
//!
//! This module contains the fundamental types used throughout the system:
//! - SourceState: Latest price per source with derived deltas
//! - ArbitrageOpportunity / BasisTradeOpportunity: Immutable signal records
//! - SpreadMatrix: Cross-venue spread snapshot
//! - IdGenerator / Clock: Injected sources of ids and wall-clock time

pub mod clock;
pub mod ids;
pub mod market_data;

pub use clock::{Clock, SystemClock};
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use market_data::{
    ArbitrageOpportunity, BasisTradeOpportunity, Opportunity, SourceState, SpreadMatrix,
};
