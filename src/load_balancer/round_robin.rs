//! Round-robin selection.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::{instance::Candidate, SelectionRequest, Selector};

/// Round-robin selector.
/// The cursor is taken modulo the current candidate count on every call, so
/// membership changes never leave it out of range.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for RoundRobin {
    fn select(&self, candidates: &[Candidate], _request: &SelectionRequest<'_>) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let cursor = self.counter.fetch_add(1, Ordering::Relaxed);
        Some(cursor % candidates.len())
    }
}
