//! Daemon lifecycle.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → MeshCoordinator → register seeds → monitor seeds → start
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown
//!     SIGHUP → reload config defaults
//!
//! Shutdown (shutdown.rs):
//!     Broadcast to background tasks → coordinator stop
//! ```
//!
//! # Design Decisions
//! - Fail fast: a bad seed aborts startup
//! - Probing starts only after every seed is registered

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::Signal;
pub use startup::{bootstrap, seed_record};
