//! Service health state machine.
//!
//! # State Transitions
//! ```text
//! Unknown → Healthy: first success
//! Healthy/Degraded/Unknown → Unhealthy: consecutive failures >= max_failures
//! Unhealthy → Healthy: consecutive successes >= recovery_checks
//! ```
//!
//! A `Degraded` probe counts as a success but lands on `Degraded` instead of
//! `Healthy`. Counters reset on every transition.

use crate::config::HealthCheckConfig;
use crate::health::probe::ProbeOutcome;
use crate::registry::ServiceStatus;

/// Consecutive outcome counters for one service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthTracker {
    consecutive_failures: u32,
    consecutive_successes: u32,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold one probe outcome into the counters and return the resulting status.
    pub fn observe(
        &mut self,
        current: ServiceStatus,
        outcome: ProbeOutcome,
        config: &HealthCheckConfig,
    ) -> ServiceStatus {
        if outcome.is_success() {
            self.consecutive_failures = 0;
            let landed = match outcome {
                ProbeOutcome::Degraded => ServiceStatus::Degraded,
                _ => ServiceStatus::Healthy,
            };

            if current != ServiceStatus::Unhealthy {
                self.consecutive_successes = 0;
                return landed;
            }

            self.consecutive_successes += 1;
            if self.consecutive_successes >= config.recovery_checks {
                self.consecutive_successes = 0;
                return landed;
            }
            return ServiceStatus::Unhealthy;
        }

        self.consecutive_successes = 0;
        if current == ServiceStatus::Unhealthy {
            return current;
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures >= config.max_failures {
            self.consecutive_failures = 0;
            return ServiceStatus::Unhealthy;
        }
        current
    }
}
