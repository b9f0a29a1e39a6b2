//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured key-value fields)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (installed by the daemon)
//!     → Prometheus exporter (optional)
//! ```

pub mod logging;
pub mod metrics;
