//! Service mesh coordinator library.
//!
//! A process-local authority over a registry of service instances: it probes
//! their health, isolates failing instances behind circuit breakers and picks
//! one healthy instance per request under a configurable algorithm.
//!
//! ```no_run
//! use mesh_coordinator::{MeshConfig, MeshCoordinator, ServiceRecord};
//!
//! # async fn run() -> Result<(), mesh_coordinator::MeshError> {
//! let mesh = MeshCoordinator::new(MeshConfig::default())?;
//! mesh.register_service(ServiceRecord::new("api", "api-1", "10.0.0.1", 8080))?;
//! mesh.start_health_monitoring("api-1", None)?;
//! mesh.start()?;
//!
//! let target = mesh.select_service("api", None)?;
//! mesh.report_performance(&target.service_id, std::time::Duration::from_millis(12), true)?;
//! # Ok(())
//! # }
//! ```

// Core subsystems
pub mod config;
pub mod coordinator;
pub mod registry;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::{Algorithm, HealthCheckConfig, LoadBalancerConfig, MeshConfig};
pub use coordinator::{CoordinatorState, MeshCoordinator, MeshStats};
pub use error::{ErrorKind, MeshError, MeshResult};
pub use events::{HealthListener, ServiceListener};
pub use health::{
    HealthCheckEntry, HealthCheckResult, HealthHistory, HealthSnapshot, ProbeOutcome, Prober, TcpProber,
};
pub use load_balancer::SelectionStats;
pub use registry::{metadata_from_json, ServiceQuery, ServiceRecord, ServiceStatus};
pub use resilience::{BreakerState, BreakerStatus};
