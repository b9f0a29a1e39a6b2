//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! register(record)
//!     → record.rs (validate identity + weight)
//!     → store.rs (id uniqueness, name membership)
//!
//! Health monitor / performance reports
//!     → store.rs (status, last response time)
//!
//! find(query)
//!     → store.rs (every record) → query.rs (name, tags, status filter)
//! ```
//!
//! # Design Decisions
//! - Pure storage, no algorithmic logic
//! - Per-entry locking; unrelated services never contend on one lock
//! - Only snapshots leave the store

pub mod query;
pub mod record;
pub mod store;

pub use query::ServiceQuery;
pub use record::{metadata_from_json, ServiceRecord, ServiceStatus};
pub use store::ServiceStore;
