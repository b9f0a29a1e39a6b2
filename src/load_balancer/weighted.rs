//! Weighted round-robin selection over a cumulative-weight table.
//!
//! For weights `[3, 1]` the table is `[3, 4]`. A cursor position `p` in
//! `0..total` maps to the first entry whose cumulative weight exceeds `p`,
//! so positions 0..3 pick the first instance and 3 picks the second. Every
//! `total` consecutive calls therefore hit each instance exactly `weight` times.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::load_balancer::{instance::Candidate, SelectionRequest, Selector};

/// Prefix sums of candidate weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightTable {
    cumulative: Vec<u64>,
}

impl WeightTable {
    pub fn new(candidates: &[Candidate]) -> Self {
        let mut running = 0u64;
        let cumulative = candidates
            .iter()
            .map(|c| {
                // Zero weights are rejected at registration; count them as 1 regardless.
                running += u64::from(c.weight().max(1));
                running
            })
            .collect();
        Self { cumulative }
    }

    pub fn total(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// Index owning `position`, which must be below `total()`.
    pub fn index_of(&self, position: u64) -> Option<usize> {
        if position >= self.total() {
            return None;
        }
        Some(self.cumulative.partition_point(|&upper| upper <= position))
    }
}

#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    cursor: AtomicU64,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for WeightedRoundRobin {
    fn select(&self, candidates: &[Candidate], _request: &SelectionRequest<'_>) -> Option<usize> {
        let table = WeightTable::new(candidates);
        let total = table.total();
        if total == 0 {
            return None;
        }
        let position = self.cursor.fetch_add(1, Ordering::Relaxed) % total;
        table.index_of(position)
    }
}
