//! Price State Store
//!
//! Maps source id → SourceState. Deltas are always computed against the
//! store's own prior value, never against a producer-supplied "previous".

use crate::core::SourceState;
use std::collections::BTreeMap;

/// Latest price state per source
#[derive(Debug, Clone, Default)]
pub struct PriceStore {
    sources: BTreeMap<String, SourceState>,
}

impl PriceStore {
    pub fn new() -> Self {
        Self {
            sources: BTreeMap::new(),
        }
    }

    /// Apply one price for one source
    ///
    /// Only that source's entry is replaced.
    pub fn apply_single(&mut self, source: &str, price: f64, now_ms: u64) -> SourceState {
        let next = SourceState::next(self.sources.get(source), price, now_ms);
        match self.sources.get_mut(source) {
            Some(slot) => *slot = next,
            None => {
                self.sources.insert(source.to_string(), next);
            }
        }
        next
    }

    /// Apply a batch of prices
    ///
    /// Every entry is derived from the state as it was before the call, then
    /// the whole batch is merged in. Sources not named keep their state.
    /// Returns the number of entries applied.
    pub fn apply_bulk<'a, I>(&mut self, updates: I, now_ms: u64) -> usize
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let staged: Vec<(&'a str, SourceState)> = updates
            .into_iter()
            .map(|(source, price)| {
                (source, SourceState::next(self.sources.get(source), price, now_ms))
            })
            .collect();

        let applied = staged.len();
        for (source, state) in staged {
            self.sources.insert(source.to_string(), state);
        }
        applied
    }

    pub fn get(&self, source: &str) -> Option<&SourceState> {
        self.sources.get(source)
    }

    /// Owned copy of every source state
    pub fn snapshot(&self) -> BTreeMap<String, SourceState> {
        self.sources.clone()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
