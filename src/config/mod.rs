//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MeshConfig (validated)
//!     → MeshCoordinator::new
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → MeshCoordinator::configure (health + load balancer defaults)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only defaults are hot-reloaded; registrations are never touched

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    Algorithm, HealthCheckConfig, LoadBalancerConfig, MeshConfig, ObservabilityConfig,
    RegistryConfig, ServiceSeed,
};
