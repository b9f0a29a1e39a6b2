//! Least Connections selection.

use crate::load_balancer::{instance::Candidate, SelectionRequest, Selector};

/// Selects the candidate with the fewest in-flight selections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl Selector for LeastConnections {
    fn select(&self, candidates: &[Candidate], _request: &SelectionRequest<'_>) -> Option<usize> {
        // min_by_key keeps the first minimum, i.e. registration order on ties
        candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| c.load.in_flight())
            .map(|(i, _)| i)
    }
}
