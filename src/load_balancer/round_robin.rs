//! Round-robin selection policy.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::load_balancer::{SelectionPolicy, backend::Backend};

/// Round-robin selector.
/// The cursor holds the last served position and each draw serves the one
/// after it, so a fresh selector starts at index 1. Every draw advances the
/// shared cursor, so concurrent callers each observe a distinct position
/// modulo the backend count.
#[derive(Debug, Default)]
pub struct RoundRobin {
    last_selected: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionPolicy for RoundRobin {
    fn candidate(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }
        let last = self.last_selected.fetch_add(1, Ordering::Relaxed);
        Some(backends[last.wrapping_add(1) % backends.len()].clone())
    }
}
