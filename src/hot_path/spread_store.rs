//! Spread Matrix Store
//!
//! Holds the single latest spread snapshot. Replace-on-arrival: cells from an
//! older snapshot never survive a newer one.

use crate::core::SpreadMatrix;

#[derive(Debug, Clone, Default)]
pub struct SpreadMatrixStore {
    current: Option<SpreadMatrix>,
}

impl SpreadMatrixStore {
    pub fn new() -> Self {
        Self { current: None }
    }

    /// Unconditionally overwrite the held matrix
    #[inline]
    pub fn replace(&mut self, matrix: SpreadMatrix) {
        self.current = Some(matrix);
    }

    /// Latest matrix, `None` until the first `spreads` event
    #[inline]
    pub fn current(&self) -> Option<&SpreadMatrix> {
        self.current.as_ref()
    }

    pub fn snapshot(&self) -> Option<SpreadMatrix> {
        self.current.clone()
    }

    pub fn has_data(&self) -> bool {
        self.current.is_some()
    }
}
