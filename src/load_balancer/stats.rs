//! Per-service-name selection statistics.

use serde::Serialize;
use std::time::Duration;

use crate::config::Algorithm;

/// Aggregate counters of one service name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionStats {
    pub service_name: String,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Exponentially weighted average of reported response times.
    pub average_response_time: Duration,
    pub last_selected: Option<String>,
    pub algorithm: Algorithm,
}

impl SelectionStats {
    pub fn new(service_name: &str, algorithm: Algorithm) -> Self {
        Self {
            service_name: service_name.to_string(),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            average_response_time: Duration::ZERO,
            last_selected: None,
            algorithm,
        }
    }

    pub fn reported(&self) -> u64 {
        self.successful_requests + self.failed_requests
    }

    pub(crate) fn record_selection(&mut self, service_id: &str, algorithm: Algorithm) {
        self.total_requests += 1;
        self.last_selected = Some(service_id.to_string());
        self.algorithm = algorithm;
    }

    pub(crate) fn record_report(&mut self, success: bool, response_time: Duration, alpha: f64) {
        let first = self.reported() == 0;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }

        if first {
            self.average_response_time = response_time;
        } else {
            let prev = self.average_response_time.as_secs_f64();
            let next = alpha * response_time.as_secs_f64() + (1.0 - alpha) * prev;
            self.average_response_time = saturating_secs(next);
        }
    }
}

/// `Duration` from seconds, clamped to `Duration::MAX` instead of panicking.
pub(crate) fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_averaging() {
        let mut stats = SelectionStats::new("svc", Algorithm::RoundRobin);
        stats.record_selection("a", Algorithm::RoundRobin);
        stats.record_report(true, Duration::from_millis(100), 0.5);
        assert_eq!(stats.average_response_time, Duration::from_millis(100));

        stats.record_report(false, Duration::from_millis(300), 0.5);
        assert!((stats.average_response_time.as_secs_f64() - 0.2).abs() < 1e-6);
        assert_eq!(stats.successful_requests, 1);
        assert_eq!(stats.failed_requests, 1);
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.last_selected.as_deref(), Some("a"));
    }

    #[test]
    fn test_huge_reports_saturate() {
        let mut stats = SelectionStats::new("svc", Algorithm::RoundRobin);
        stats.record_report(true, Duration::MAX, 0.3);
        stats.record_report(true, Duration::MAX, 0.3);
        assert_eq!(stats.average_response_time, Duration::MAX);

        stats.record_report(true, Duration::from_millis(1), 0.3);
        assert!(stats.average_response_time > Duration::from_secs(1));
    }
}
