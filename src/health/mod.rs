//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic probing (active.rs):
//!     One task per monitored service, ticking at its interval
//!     → probe.rs (Prober under the configured timeout)
//!     → state.rs (consecutive failure / recovery counting)
//!     → registry status + health listener on change
//!     → history.rs (bounded log of applied checks)
//!
//! Manual check (active.rs):
//!     Same path, driven by the caller, result returned synchronously
//! ```
//!
//! # Design Decisions
//! - Probes for different services never wait on each other
//! - A timed-out probe is one failure
//! - State transitions require consecutive successes/failures

pub mod active;
pub mod history;
pub mod probe;
pub mod state;

pub use active::{HealthCheckResult, HealthMonitor, HealthSnapshot};
pub use history::{HealthCheckEntry, HealthHistory, HISTORY_CAPACITY};
pub use probe::{ProbeOutcome, Prober, TcpProber};
pub use state::HealthTracker;
