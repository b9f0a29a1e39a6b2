//! Circuit breaker for service protection.
//!
//! # States
//! - Closed: normal operation, the instance is offered for selection
//! - Open: instance assumed down, excluded from selection
//! - Half-Open: the next report decides whether it recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= threshold
//! Open → Half-Open: first observation after timeout has elapsed since opened_at
//! Half-Open → Closed: next report succeeds
//! Half-Open → Open: next report fails (fresh opened_at)
//! ```
//!
//! # Design Decisions
//! - Per-service breaker (not global), one bank entry per registered id
//! - Open → Half-Open is lazy: any report, status or selection check observes it
//! - Reports while Open are counted but never change state

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::error::{require_id, MeshError, MeshResult};
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

/// Threshold and open-state timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub threshold: u32,
    pub timeout: Duration,
}

/// Snapshot of one breaker.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BreakerStatus {
    pub state: BreakerState,
    pub is_open: bool,
    pub failure_count: u32,
    pub last_response_time: Option<Duration>,
}

/// A single service's breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    settings: BreakerSettings,
    last_response_time: Option<Duration>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            settings,
            last_response_time: None,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Move Open → HalfOpen once the timeout has elapsed.
    pub fn refresh(&mut self, now: Instant) -> Option<BreakerState> {
        if self.state != BreakerState::Open {
            return None;
        }
        let elapsed = self
            .opened_at
            .map(|at| now.saturating_duration_since(at) >= self.settings.timeout)
            .unwrap_or(true);
        if elapsed {
            self.state = BreakerState::HalfOpen;
            return Some(self.state);
        }
        None
    }

    /// Apply one outcome. Returns the new state if it changed.
    pub fn record(&mut self, success: bool, response_time: Duration, now: Instant) -> Option<BreakerState> {
        let before = self.state;
        self.refresh(now);
        self.last_response_time = Some(response_time);

        match (self.state, success) {
            (BreakerState::Closed, true) => self.consecutive_failures = 0,
            (BreakerState::Closed, false) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.settings.threshold {
                    self.trip(now);
                }
            }
            (BreakerState::Open, true) => {}
            (BreakerState::Open, false) => self.consecutive_failures += 1,
            (BreakerState::HalfOpen, true) => {
                self.state = BreakerState::Closed;
                self.consecutive_failures = 0;
                self.opened_at = None;
            }
            (BreakerState::HalfOpen, false) => {
                self.consecutive_failures += 1;
                self.trip(now);
            }
        }

        (self.state != before).then_some(self.state)
    }

    /// Force Closed with zero failures.
    pub fn reset(&mut self) {
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    pub fn status(&self) -> BreakerStatus {
        BreakerStatus {
            state: self.state,
            is_open: self.state == BreakerState::Open,
            failure_count: self.consecutive_failures,
            last_response_time: self.last_response_time,
        }
    }

    fn trip(&mut self, now: Instant) {
        self.state = BreakerState::Open;
        self.opened_at = Some(now);
    }
}

/// One breaker per registered service id.
#[derive(Debug, Default)]
pub struct CircuitBreakerBank {
    breakers: DashMap<String, CircuitBreaker>,
}

impl CircuitBreakerBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a Closed breaker for `service_id` unless one exists.
    pub fn track(&self, service_id: &str, settings: BreakerSettings) {
        self.breakers
            .entry(service_id.to_string())
            .or_insert_with(|| CircuitBreaker::new(settings));
    }

    pub fn forget(&self, service_id: &str) {
        self.breakers.remove(service_id);
    }

    /// Apply new settings to every breaker.
    pub fn reconfigure(&self, settings: BreakerSettings) {
        for mut breaker in self.breakers.iter_mut() {
            breaker.settings = settings;
        }
    }

    pub fn report(&self, service_id: &str, response_time: Duration, success: bool) -> MeshResult<BreakerState> {
        require_id(service_id, "service_id")?;
        let mut breaker = self
            .breakers
            .get_mut(service_id)
            .ok_or_else(|| MeshError::NotFound(service_id.to_string()))?;

        if let Some(state) = breaker.record(success, response_time, Instant::now()) {
            log_transition(service_id, state, breaker.consecutive_failures);
        }
        Ok(breaker.state())
    }

    /// Selection check. Unknown ids are treated as closed.
    pub fn is_open(&self, service_id: &str) -> bool {
        let Some(mut breaker) = self.breakers.get_mut(service_id) else {
            return false;
        };
        if let Some(state) = breaker.refresh(Instant::now()) {
            log_transition(service_id, state, breaker.consecutive_failures);
        }
        breaker.state() == BreakerState::Open
    }

    pub fn status(&self, service_id: &str) -> MeshResult<BreakerStatus> {
        require_id(service_id, "service_id")?;
        let mut breaker = self
            .breakers
            .get_mut(service_id)
            .ok_or_else(|| MeshError::NotFound(service_id.to_string()))?;
        if let Some(state) = breaker.refresh(Instant::now()) {
            log_transition(service_id, state, breaker.consecutive_failures);
        }
        Ok(breaker.status())
    }

    pub fn reset(&self, service_id: &str) -> MeshResult<()> {
        require_id(service_id, "service_id")?;
        let mut breaker = self
            .breakers
            .get_mut(service_id)
            .ok_or_else(|| MeshError::NotFound(service_id.to_string()))?;
        breaker.reset();
        tracing::info!(service_id = %service_id, "Circuit breaker reset");
        Ok(())
    }

    /// Number of breakers currently open (without refreshing).
    pub fn open_count(&self) -> usize {
        self.breakers
            .iter()
            .filter(|b| b.state() == BreakerState::Open)
            .count()
    }
}

fn log_transition(service_id: &str, state: BreakerState, failures: u32) {
    metrics::record_breaker_transition(state.as_str());
    match state {
        BreakerState::Open => {
            tracing::warn!(service_id = %service_id, failures, "Circuit breaker opened")
        }
        BreakerState::HalfOpen => {
            tracing::info!(service_id = %service_id, "Circuit breaker half-open")
        }
        BreakerState::Closed => {
            tracing::info!(service_id = %service_id, "Circuit breaker closed")
        }
    }
}
