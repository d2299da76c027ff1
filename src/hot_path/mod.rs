//! Engine-owned state stores
//!
//! Synchronous, CPU-only structures mutated exclusively by the
//! aggregation engine:
//! - Per-source price state
//! - Bounded opportunity histories
//! - Latest spread matrix

pub mod opportunity_buffer;
pub mod price_store;
pub mod spread_store;

pub use opportunity_buffer::{OpportunityBuffer, DEFAULT_CAPACITY};
pub use price_store::PriceStore;
pub use spread_store::SpreadMatrixStore;
