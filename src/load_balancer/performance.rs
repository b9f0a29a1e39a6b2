//! Performance based selection.
//!
//! Among candidates whose recent success rate is at least `min_success_rate`,
//! pick the lowest smoothed response time. Instances without reports score
//! zero so they get tried. Ties go to fewer total selections, then
//! registration order. When no candidate meets the success rate, all of them
//! compete on the same terms.

use std::cmp::Ordering;

use crate::load_balancer::{instance::Candidate, SelectionRequest, Selector};

#[derive(Debug)]
pub struct PerformanceBased {
    min_success_rate: f64,
}

impl PerformanceBased {
    pub fn new(min_success_rate: f64) -> Self {
        Self { min_success_rate }
    }

    fn compare(a: &Candidate, b: &Candidate) -> Ordering {
        let a_ms = a.load.average_response_ms().unwrap_or(0.0);
        let b_ms = b.load.average_response_ms().unwrap_or(0.0);
        a_ms.total_cmp(&b_ms)
            .then_with(|| a.load.total_requests().cmp(&b.load.total_requests()))
    }
}

impl Selector for PerformanceBased {
    fn select(&self, candidates: &[Candidate], _request: &SelectionRequest<'_>) -> Option<usize> {
        let acceptable: Vec<(usize, &Candidate)> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.load.success_rate() >= self.min_success_rate)
            .collect();

        let pool = if acceptable.is_empty() {
            candidates.iter().enumerate().collect()
        } else {
            acceptable
        };

        pool.into_iter()
            .min_by(|(_, a), (_, b)| Self::compare(a, b))
            .map(|(i, _)| i)
    }
}
