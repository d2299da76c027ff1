//! Opportunity id generation
//!
//! The engine owns one generator and shares it across both opportunity
//! buffers, so every assigned id is unique within the process.

use crate::core::clock::{Clock, SystemClock};
use uuid::Uuid;

/// Source of unique opportunity identifiers
pub trait IdGenerator: Send + Sync {
    fn next_id(&mut self) -> String;
}

/// Monotonic counter: "1", "2", ...
///
/// Deterministic, used by tests and replay tooling.
#[derive(Debug, Default, Clone)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Continue counting after `last`
    pub fn starting_after(last: u64) -> Self {
        Self { next: last }
    }
}

impl IdGenerator for SequentialIds {
    #[inline]
    fn next_id(&mut self) -> String {
        self.next += 1;
        self.next.to_string()
    }
}

/// Wall-clock millis plus a random UUID: `<millis>-<uuid>`
#[derive(Debug, Default, Clone)]
pub struct RandomIds {
    clock: SystemClock,
}

impl RandomIds {
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> String {
        format!("{}-{}", self.clock.now_ms(), Uuid::new_v4().simple())
    }
}
