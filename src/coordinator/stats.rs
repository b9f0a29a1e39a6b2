use serde::Serialize;
use std::time::Duration;

use crate::load_balancer::stats::saturating_secs;
use crate::load_balancer::SelectionStats;

/// Coordinator-wide statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeshStats {
    pub node_id: String,
    pub total_services: usize,
    pub healthy_services: usize,
    pub unhealthy_services: usize,
    pub degraded_services: usize,
    pub open_circuit_breakers: usize,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Average of the per-name averages, weighted by their report counts.
    pub average_response_time: Duration,
    pub uptime: Duration,
}

impl MeshStats {
    pub(crate) fn absorb(&mut self, per_name: &[SelectionStats]) {
        let mut weighted_secs = 0.0;
        let mut reports = 0u64;

        for stats in per_name {
            self.total_requests += stats.total_requests;
            self.successful_requests += stats.successful_requests;
            self.failed_requests += stats.failed_requests;
            weighted_secs += stats.average_response_time.as_secs_f64() * stats.reported() as f64;
            reports += stats.reported();
        }

        if reports > 0 {
            self.average_response_time = saturating_secs(weighted_secs / reports as f64);
        }
    }
}
