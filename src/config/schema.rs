//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the mesh
//! coordinator. All types derive Serde traits for deserialization from config
//! files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::registry::ServiceStatus;

/// Root configuration for the mesh coordinator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MeshConfig {
    /// Node identifier. A UUID is generated when left blank.
    pub node_id: String,

    /// Port advertised for this node.
    pub listen_port: u16,

    /// Default health check settings.
    pub health_check: HealthCheckConfig,

    /// Default load balancer settings.
    pub load_balancer: LoadBalancerConfig,

    /// Registry behavior.
    pub registry: RegistryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Services registered at boot by the daemon.
    pub services: Vec<ServiceSeed>,
}

/// Health check configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Probe interval in milliseconds.
    pub interval_ms: u64,

    /// Probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Number of consecutive failures before marking unhealthy.
    pub max_failures: u32,

    /// Number of consecutive successes before an unhealthy service is healthy again.
    pub recovery_checks: u32,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            timeout_ms: 5_000,
            max_failures: 3,
            recovery_checks: 2,
        }
    }
}

/// Load balancing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    RoundRobin,
    LeastConnections,
    WeightedRoundRobin,
    PerformanceBased,
    Random,
    ConsistentHash,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "round_robin",
            Algorithm::LeastConnections => "least_connections",
            Algorithm::WeightedRoundRobin => "weighted_round_robin",
            Algorithm::PerformanceBased => "performance_based",
            Algorithm::Random => "random",
            Algorithm::ConsistentHash => "consistent_hash",
        }
    }
}

/// Load balancer configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Selection algorithm.
    pub algorithm: Algorithm,

    /// Exclude instances whose circuit breaker is open.
    pub enable_circuit_breaker: bool,

    /// Consecutive failed reports before a breaker opens.
    pub circuit_breaker_threshold: u32,

    /// Time an open breaker waits before allowing a half-open probe, in milliseconds.
    pub circuit_breaker_timeout_ms: u64,

    /// Hash ring points per service instance.
    pub hash_replicas: u32,

    /// Weight random picks by instance weight.
    pub weighted_random: bool,

    /// Smoothing factor of the response time EWMA, in (0, 1].
    pub response_time_alpha: f64,

    /// Number of recent reports used for the success rate.
    pub success_window: usize,

    /// Minimum recent success rate for performance based selection.
    pub min_success_rate: f64,
}

impl LoadBalancerConfig {
    pub fn circuit_breaker_timeout(&self) -> Duration {
        Duration::from_millis(self.circuit_breaker_timeout_ms)
    }
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::RoundRobin,
            enable_circuit_breaker: true,
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout_ms: 60_000,
            hash_replicas: 100,
            weighted_random: false,
            response_time_alpha: 0.3,
            success_window: 20,
            min_success_rate: 0.5,
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Status given to a service at registration.
    pub initial_status: ServiceStatus,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            initial_status: ServiceStatus::Healthy,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// A service registered at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceSeed {
    /// Logical service name (load balancing group).
    pub name: String,

    /// Unique instance identifier.
    pub id: String,

    /// Host or IP address.
    pub endpoint: String,

    pub port: u16,

    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Opaque JSON metadata.
    #[serde(default)]
    pub metadata: Option<String>,
}

fn default_weight() -> u32 {
    1
}
