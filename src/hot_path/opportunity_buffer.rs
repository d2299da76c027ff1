//! Bounded opportunity buffer
//!
//! Newest-first history with fixed capacity. Insertion order is
//! authoritative: the embedded timestamp is never used for ordering.

use crate::core::{IdGenerator, Opportunity};
use std::collections::VecDeque;

/// Default number of opportunities kept per buffer
pub const DEFAULT_CAPACITY: usize = 50;

/// Capacity-limited, newest-first list of opportunities
#[derive(Debug, Clone)]
pub struct OpportunityBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Opportunity> OpportunityBuffer<T> {
    /// Create buffer holding at most `capacity` records (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Prepend a record, evicting the oldest ones beyond capacity
    ///
    /// A record without an id gets the next id from `ids`.
    /// Returns the id the record is stored under.
    pub fn push(&mut self, mut record: T, ids: &mut dyn IdGenerator) -> String {
        if record.id().is_empty() {
            record.set_id(ids.next_id());
        }
        let id = record.id().to_string();

        self.entries.push_front(record);
        self.entries.truncate(self.capacity);
        id
    }

    /// Owned copy, newest first
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }

    /// Most recently pushed record
    pub fn latest(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Opportunity> Default for OpportunityBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
