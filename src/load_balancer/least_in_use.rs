//! Least-in-use selection policy.

use std::sync::Arc;
use crate::load_balancer::{SelectionPolicy, backend::Backend};

/// Selects the live backend with the fewest checked-out slots.
/// Dead backends are skipped here rather than by redrawing, so the answer is
/// deterministic for a given pool state.
#[derive(Debug, Default)]
pub struct LeastInUse;

impl LeastInUse {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionPolicy for LeastInUse {
    fn candidate(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        // min_by_key keeps the first of equal minima, so ties go to list order
        backends
            .iter()
            .filter(|b| b.is_alive())
            .min_by_key(|b| b.in_use_count())
            .cloned()
    }
}
