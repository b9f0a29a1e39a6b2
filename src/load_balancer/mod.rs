//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! select(service_name, client_id)
//!     → pool.rs (registered instances of the name)
//!     → filter: status Healthy/Degraded, breaker not open
//!     → Apply the configured algorithm:
//!         - round_robin.rs (rotate through candidates)
//!         - least_conn.rs (fewest in-flight selections)
//!         - weighted.rs (cumulative-weight cycle)
//!         - performance.rs (lowest smoothed response time)
//!         - random.rs (uniform or weighted)
//!         - consistent_hash.rs (client key on a hash ring)
//!     → stats.rs (per-name counters) + instance.rs (per-instance load)
//!     → Return a record snapshot or error
//! ```
//!
//! # Design Decisions
//! - Selectors only pick an index; filtering and bookkeeping live in pool.rs
//! - One selector per service name, rebuilt when the algorithm settings change
//! - Selection never touches the network

pub mod consistent_hash;
pub mod instance;
pub mod least_conn;
pub mod performance;
pub mod pool;
pub mod random;
pub mod round_robin;
pub mod stats;
pub mod weighted;

use crate::config::{Algorithm, LoadBalancerConfig};

pub use instance::{Candidate, InstanceLoad};
pub use pool::LoadBalancer;
pub use stats::SelectionStats;

/// Inputs of one selection besides the candidates.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectionRequest<'a> {
    /// Affinity key for consistent hashing.
    pub client_id: Option<&'a str>,
    /// Every registered instance id of the name, candidates or not, in registration order.
    pub members: &'a [String],
}

/// A selection algorithm. Returns an index into `candidates`.
pub trait Selector: Send + Sync + std::fmt::Debug {
    fn select(&self, candidates: &[Candidate], request: &SelectionRequest<'_>) -> Option<usize>;
}

/// Build the selector for `config.algorithm`.
pub fn build_selector(config: &LoadBalancerConfig) -> Box<dyn Selector> {
    match config.algorithm {
        Algorithm::RoundRobin => Box::new(round_robin::RoundRobin::new()),
        Algorithm::LeastConnections => Box::new(least_conn::LeastConnections::new()),
        Algorithm::WeightedRoundRobin => Box::new(weighted::WeightedRoundRobin::new()),
        Algorithm::PerformanceBased => Box::new(performance::PerformanceBased::new(config.min_success_rate)),
        Algorithm::Random => Box::new(random::RandomSelector::new(config.weighted_random)),
        Algorithm::ConsistentHash => Box::new(consistent_hash::ConsistentHash::new(config.hash_replicas)),
    }
}

/// Whether switching from `old` to `new` requires a fresh selector.
pub(crate) fn selector_changed(old: &LoadBalancerConfig, new: &LoadBalancerConfig) -> bool {
    old.algorithm != new.algorithm
        || old.hash_replicas != new.hash_replicas
        || old.weighted_random != new.weighted_random
        || old.min_success_rate != new.min_success_rate
}
