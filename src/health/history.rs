//! Bounded per-service record of recent health checks.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use crate::health::probe::ProbeOutcome;
use crate::registry::ServiceStatus;

/// Checks kept per service; older ones are dropped first.
pub const HISTORY_CAPACITY: usize = 100;

/// One applied health check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheckEntry {
    pub checked_at: SystemTime,
    pub outcome: ProbeOutcome,
    /// Status after the check was applied.
    pub status: ServiceStatus,
    /// `None` when the probe timed out.
    pub response_time: Option<Duration>,
}

/// Recent checks of one service plus the rates derived from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthHistory {
    pub service_id: String,
    /// Oldest first.
    pub checks: Vec<HealthCheckEntry>,
    /// Share of checks whose probe succeeded (1.0 without checks).
    pub success_rate: f64,
    /// Share of checks after which the service was selectable, in percent
    /// (100.0 without checks).
    pub uptime_percentage: f64,
    /// Mean response time of the checks that completed.
    pub average_response_time: Option<Duration>,
}

#[derive(Debug, Default)]
pub(crate) struct CheckLog {
    entries: VecDeque<HealthCheckEntry>,
}

impl CheckLog {
    pub(crate) fn push(&mut self, entry: HealthCheckEntry) {
        if self.entries.len() == HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub(crate) fn report(&self, service_id: &str) -> HealthHistory {
        let total = self.entries.len();
        let successes = self.entries.iter().filter(|e| e.outcome.is_success()).count();
        let up = self.entries.iter().filter(|e| e.status.is_selectable()).count();
        let timings: Vec<Duration> = self.entries.iter().filter_map(|e| e.response_time).collect();

        let (success_rate, uptime_percentage) = if total == 0 {
            (1.0, 100.0)
        } else {
            (
                successes as f64 / total as f64,
                up as f64 / total as f64 * 100.0,
            )
        };
        let average_response_time = (!timings.is_empty()).then(|| {
            let sum = timings.iter().fold(Duration::ZERO, |acc, t| acc.saturating_add(*t));
            sum / timings.len() as u32
        });

        HealthHistory {
            service_id: service_id.to_string(),
            checks: self.entries.iter().cloned().collect(),
            success_rate,
            uptime_percentage,
            average_response_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(outcome: ProbeOutcome, status: ServiceStatus, ms: Option<u64>) -> HealthCheckEntry {
        HealthCheckEntry {
            checked_at: SystemTime::now(),
            outcome,
            status,
            response_time: ms.map(Duration::from_millis),
        }
    }

    #[test]
    fn test_empty_report() {
        let report = CheckLog::default().report("a");
        assert!(report.checks.is_empty());
        assert_eq!(report.success_rate, 1.0);
        assert_eq!(report.uptime_percentage, 100.0);
        assert_eq!(report.average_response_time, None);
    }

    #[test]
    fn test_rates() {
        let mut log = CheckLog::default();
        log.push(entry(ProbeOutcome::Up, ServiceStatus::Healthy, Some(10)));
        log.push(entry(ProbeOutcome::Down, ServiceStatus::Healthy, Some(30)));
        log.push(entry(ProbeOutcome::Down, ServiceStatus::Unhealthy, None));
        log.push(entry(ProbeOutcome::Degraded, ServiceStatus::Unhealthy, Some(20)));

        let report = log.report("a");
        assert_eq!(report.checks.len(), 4);
        assert_eq!(report.success_rate, 0.5);
        assert_eq!(report.uptime_percentage, 50.0);
        assert_eq!(report.average_response_time, Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_bounded() {
        let mut log = CheckLog::default();
        log.push(entry(ProbeOutcome::Down, ServiceStatus::Unhealthy, None));
        for _ in 0..HISTORY_CAPACITY {
            log.push(entry(ProbeOutcome::Up, ServiceStatus::Healthy, Some(1)));
        }
        let report = log.report("a");
        assert_eq!(report.checks.len(), HISTORY_CAPACITY);
        assert_eq!(report.success_rate, 1.0);
    }
}
