//! Random selection, uniform or weighted.

use rand::Rng;

use crate::load_balancer::weighted::WeightTable;
use crate::load_balancer::{instance::Candidate, SelectionRequest, Selector};

#[derive(Debug, Default)]
pub struct RandomSelector {
    weighted: bool,
}

impl RandomSelector {
    pub fn new(weighted: bool) -> Self {
        Self { weighted }
    }
}

impl Selector for RandomSelector {
    fn select(&self, candidates: &[Candidate], _request: &SelectionRequest<'_>) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let mut rng = rand::thread_rng();
        if !self.weighted {
            return Some(rng.gen_range(0..candidates.len()));
        }
        let table = WeightTable::new(candidates);
        table.index_of(rng.gen_range(0..table.total()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::candidates;

    #[test]
    fn test_uniform_covers_all() {
        let lb = RandomSelector::new(false);
        let set = candidates(&[("a", 1), ("b", 1), ("c", 1)]);
        let req = SelectionRequest::default();
        let mut seen = [0usize; 3];
        for _ in 0..600 {
            seen[lb.select(&set, &req).unwrap()] += 1;
        }
        assert!(seen.iter().all(|n| *n > 100), "{seen:?}");
    }

    #[test]
    fn test_weighted_prefers_heavy() {
        let lb = RandomSelector::new(true);
        let set = candidates(&[("heavy", 9), ("light", 1)]);
        let req = SelectionRequest::default();
        let heavy = (0..1000)
            .filter(|_| lb.select(&set, &req) == Some(0))
            .count();
        assert!(heavy > 800, "heavy picked {heavy} times");
    }
}
