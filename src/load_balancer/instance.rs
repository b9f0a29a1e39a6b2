//! Per-instance load tracking.
//!
//! # Responsibilities
//! - Count in-flight selections (Least Connections)
//! - Keep a response time EWMA and a window of recent outcomes (Performance Based)
//! - Count total selections (Performance Based tie-break)

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::registry::ServiceRecord;

#[derive(Debug, Default)]
struct Performance {
    ewma_ms: Option<f64>,
    recent: VecDeque<bool>,
}

/// Load counters of one service instance.
#[derive(Debug, Default)]
pub struct InstanceLoad {
    in_flight: AtomicUsize,
    total_requests: AtomicU64,
    performance: Mutex<Performance>,
}

impl InstanceLoad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Called when the instance is handed out.
    pub fn begin(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Called on a completion report. Never underflows, even for reports
    /// that were not preceded by a selection.
    pub fn finish(&self, success: bool, response_time: Duration, alpha: f64, window: usize) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));

        let mut perf = self.performance.lock().unwrap_or_else(|p| p.into_inner());
        let sample = response_time.as_secs_f64() * 1000.0;
        perf.ewma_ms = Some(match perf.ewma_ms {
            Some(prev) => alpha * sample + (1.0 - alpha) * prev,
            None => sample,
        });
        perf.recent.push_back(success);
        while perf.recent.len() > window.max(1) {
            perf.recent.pop_front();
        }
    }

    /// Smoothed response time in milliseconds, `None` before the first report.
    pub fn average_response_ms(&self) -> Option<f64> {
        self.performance.lock().unwrap_or_else(|p| p.into_inner()).ewma_ms
    }

    /// Success rate over the recent window. 1.0 when nothing was reported yet.
    pub fn success_rate(&self) -> f64 {
        let perf = self.performance.lock().unwrap_or_else(|p| p.into_inner());
        if perf.recent.is_empty() {
            return 1.0;
        }
        let ok = perf.recent.iter().filter(|s| **s).count();
        ok as f64 / perf.recent.len() as f64
    }
}

/// A selectable instance: record snapshot plus its live load counters.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub record: ServiceRecord,
    pub load: std::sync::Arc<InstanceLoad>,
}

impl Candidate {
    pub fn service_id(&self) -> &str {
        &self.record.service_id
    }

    pub fn weight(&self) -> u32 {
        self.record.weight
    }
}
