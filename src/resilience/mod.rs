//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Probe of an external service:
//!     → timeouts.rs (enforce probe deadline)
//!
//! Performance report after a selection:
//!     → circuit_breaker.rs (track failures, open circuit if threshold exceeded)
//!
//! Selection:
//!     → circuit_breaker.rs (open breakers exclude the instance)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Circuit breaker prevents repeatedly selecting a failing instance

pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{BreakerSettings, BreakerState, BreakerStatus, CircuitBreakerBank};
