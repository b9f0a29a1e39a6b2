//! Mesh coordinator.
//!
//! # Data Flow
//! ```text
//! register/unregister → registry (store.rs)
//!                     → breaker bank, load tracking, monitors
//!                     → service listener
//!
//! start → health monitor spawns probe tasks on the current runtime
//! stop  → probe tasks cancelled, monitoring config kept
//!
//! select_service → load_balancer (registry + breakers) → record snapshot
//! report_performance → load_balancer → stats, breaker, registry
//! ```
//!
//! # Lifecycle
//! ```text
//! Created → Started: start()
//! Started → Stopped: stop()
//! Stopped → Started: start() again
//! ```
//! `start` on a running coordinator is a no-op and `stop` is idempotent.
//! Everything except probing works in every state.

mod stats;

pub use stats::MeshStats;

use serde::Serialize;
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

use crate::config::validation::{validate_config, validate_health, validate_load_balancer};
use crate::config::{HealthCheckConfig, LoadBalancerConfig, MeshConfig, RegistryConfig};
use crate::error::{require_id, MeshError, MeshResult};
use crate::events::{HealthListener, Notifier, ServiceListener};
use crate::health::{HealthCheckResult, HealthHistory, HealthMonitor, HealthSnapshot, Prober, TcpProber};
use crate::load_balancer::{LoadBalancer, SelectionStats};
use crate::observability::metrics;
use crate::registry::{ServiceQuery, ServiceRecord, ServiceStatus, ServiceStore};
use crate::resilience::{BreakerSettings, BreakerStatus, CircuitBreakerBank};

/// Coordinator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoordinatorState {
    Created,
    Started,
    Stopped,
}

#[derive(Debug)]
struct Lifecycle {
    state: CoordinatorState,
    started_at: Option<Instant>,
}

/// Owns the registry, health monitor, breakers and load balancer of one node.
pub struct MeshCoordinator {
    node_id: String,
    listen_port: u16,
    registry: RegistryConfig,
    store: Arc<ServiceStore>,
    breakers: Arc<CircuitBreakerBank>,
    notifier: Arc<Notifier>,
    health: Arc<HealthMonitor>,
    balancer: LoadBalancer,
    lifecycle: Mutex<Lifecycle>,
    membership: MembershipLocks,
}

/// Striped locks serializing membership changes of the same service id.
///
/// Registration, unregistration and monitor start for one id take its stripe,
/// so the attached breaker, load and monitor state always follows the
/// registry. Different ids only contend on a stripe collision.
struct MembershipLocks {
    hasher: RandomState,
    stripes: Box<[Mutex<()>]>,
}

impl MembershipLocks {
    const STRIPES: usize = 64;

    fn new() -> Self {
        Self {
            hasher: RandomState::new(),
            stripes: (0..Self::STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn lock(&self, service_id: &str) -> MutexGuard<'_, ()> {
        let stripe = self.hasher.hash_one(service_id) as usize % self.stripes.len();
        // Guards nothing but ordering, so poisoning carries no broken state.
        self.stripes[stripe].lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl MeshCoordinator {
    /// Build a coordinator that probes over TCP.
    pub fn new(config: MeshConfig) -> MeshResult<Self> {
        Self::with_prober(config, Arc::new(TcpProber::new()))
    }

    /// Build a coordinator with a custom probing capability.
    pub fn with_prober(config: MeshConfig, prober: Arc<dyn Prober>) -> MeshResult<Self> {
        if let Err(errors) = validate_config(&config) {
            let joined = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(MeshError::Configuration(joined));
        }

        let node_id = if config.node_id.trim().is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            config.node_id.clone()
        };

        let store = Arc::new(ServiceStore::new());
        let breakers = Arc::new(CircuitBreakerBank::new());
        let notifier = Arc::new(Notifier::new());
        let health = Arc::new(HealthMonitor::new(
            store.clone(),
            prober,
            notifier.clone(),
            config.health_check.clone(),
        ));
        let balancer = LoadBalancer::new(store.clone(), breakers.clone(), config.load_balancer.clone());

        tracing::info!(
            node_id = %node_id,
            listen_port = config.listen_port,
            algorithm = config.load_balancer.algorithm.as_str(),
            "Mesh coordinator created"
        );

        Ok(Self {
            node_id,
            listen_port: config.listen_port,
            registry: config.registry,
            store,
            breakers,
            notifier,
            health,
            balancer,
            lifecycle: Mutex::new(Lifecycle {
                state: CoordinatorState::Created,
                started_at: None,
            }),
            membership: MembershipLocks::new(),
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    // --- Lifecycle ---

    /// Start probing. Must be called from within a Tokio runtime.
    pub fn start(&self) -> MeshResult<()> {
        let runtime = Handle::try_current()
            .map_err(|e| MeshError::Internal(format!("start requires a Tokio runtime: {e}")))?;
        let mut lifecycle = self.lifecycle()?;
        if lifecycle.state == CoordinatorState::Started {
            tracing::info!(node_id = %self.node_id, "Mesh coordinator already running");
            return Ok(());
        }

        self.health.run(runtime);
        lifecycle.state = CoordinatorState::Started;
        lifecycle.started_at = Some(Instant::now());
        tracing::info!(node_id = %self.node_id, services = self.store.len(), "Mesh coordinator started");
        Ok(())
    }

    /// Cancel all probe tasks. Safe to call in any state.
    pub fn stop(&self) -> MeshResult<()> {
        let mut lifecycle = self.lifecycle()?;
        if lifecycle.state != CoordinatorState::Started {
            return Ok(());
        }

        self.health.halt();
        lifecycle.state = CoordinatorState::Stopped;
        lifecycle.started_at = None;
        tracing::info!(node_id = %self.node_id, "Mesh coordinator stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.state() == CoordinatorState::Started
    }

    pub fn state(&self) -> CoordinatorState {
        self.lifecycle.lock().unwrap_or_else(|p| p.into_inner()).state
    }

    pub fn uptime(&self) -> Duration {
        self.lifecycle
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .started_at
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }

    /// Replace the health and/or load balancer defaults. Both are validated
    /// before either is applied.
    pub fn configure(
        &self,
        health_check: Option<HealthCheckConfig>,
        load_balancer: Option<LoadBalancerConfig>,
    ) -> MeshResult<()> {
        if let Some(config) = &health_check {
            validate_health(config)?;
        }
        if let Some(config) = &load_balancer {
            validate_load_balancer(config)?;
        }

        if let Some(config) = health_check {
            tracing::info!(
                interval_ms = config.interval_ms,
                timeout_ms = config.timeout_ms,
                max_failures = config.max_failures,
                recovery_checks = config.recovery_checks,
                "Health check defaults updated"
            );
            self.health.set_defaults(config)?;
        }
        if let Some(config) = load_balancer {
            tracing::info!(
                algorithm = config.algorithm.as_str(),
                circuit_breaker = config.enable_circuit_breaker,
                "Load balancer defaults updated"
            );
            self.breakers.reconfigure(breaker_settings(&config));
            self.balancer.set_config(config)?;
        }
        Ok(())
    }

    pub fn health_defaults(&self) -> HealthCheckConfig {
        self.health.defaults()
    }

    pub fn load_balancer_config(&self) -> LoadBalancerConfig {
        self.balancer.config()
    }

    // --- Registry ---

    /// Register a service instance. Its status is reset to the configured
    /// initial status.
    ///
    /// The breaker and load counters exist before the record becomes
    /// visible, and are rolled back if the registry rejects it.
    pub fn register_service(&self, mut record: ServiceRecord) -> MeshResult<()> {
        record.validate()?;
        record.status = self.registry.initial_status;

        let _membership = self.membership.lock(&record.service_id);
        if self.store.contains(&record.service_id) {
            return Err(MeshError::AlreadyExists(record.service_id));
        }

        self.breakers
            .track(&record.service_id, breaker_settings(&self.balancer.config()));
        self.balancer.track(&record.service_id);
        if let Err(e) = self.store.register(record.clone()) {
            self.breakers.forget(&record.service_id);
            self.balancer.forget(&record.service_id);
            return Err(e);
        }

        tracing::info!(
            service_name = %record.service_name,
            service_id = %record.service_id,
            address = %record.address(),
            weight = record.weight,
            "Service registered"
        );
        metrics::record_registry_size(self.store.len());
        self.notifier.registered(&record);
        Ok(())
    }

    /// Remove a service instance and every piece of state attached to it.
    pub fn unregister_service(&self, service_id: &str) -> MeshResult<ServiceRecord> {
        require_id(service_id, "service_id")?;
        let _membership = self.membership.lock(service_id);
        let record = self.store.unregister(service_id)?;

        self.health.forget(service_id);
        self.breakers.forget(service_id);
        self.balancer.forget(service_id);

        tracing::info!(
            service_name = %record.service_name,
            service_id = %service_id,
            "Service unregistered"
        );
        metrics::record_registry_size(self.store.len());
        self.notifier.unregistered(&record);
        Ok(record)
    }

    pub fn update_service_metadata(&self, service_id: &str, metadata: serde_json::Value) -> MeshResult<()> {
        self.store.update_metadata(service_id, metadata)
    }

    /// Instances registered under `service_name`, in registration order.
    pub fn discover_services(&self, service_name: &str) -> MeshResult<Vec<ServiceRecord>> {
        require_id(service_name, "service_name")?;
        self.store.list_by_name(service_name)
    }

    /// Instances of any name matching `query`.
    pub fn find_services(&self, query: &ServiceQuery) -> Vec<ServiceRecord> {
        self.store.find(query)
    }

    pub fn all_services(&self) -> Vec<ServiceRecord> {
        self.store.list_all()
    }

    pub fn service(&self, service_id: &str) -> MeshResult<ServiceRecord> {
        self.store.get(service_id)
    }

    /// Current health of one service, without probing.
    pub fn service_health(&self, service_id: &str) -> MeshResult<HealthSnapshot> {
        let record = self.store.get(service_id)?;
        Ok(HealthSnapshot {
            service_id: record.service_id,
            service_name: record.service_name,
            status: record.status,
            last_response_time: record.last_response_time,
        })
    }

    // --- Health ---

    /// Monitor `service_id` with `config`, or the current defaults when `None`.
    pub fn start_health_monitoring(&self, service_id: &str, config: Option<HealthCheckConfig>) -> MeshResult<()> {
        let config = config.unwrap_or_else(|| self.health.defaults());
        let _membership = self.membership.lock(service_id);
        self.health.start_monitoring(service_id, config)
    }

    pub fn stop_health_monitoring(&self, service_id: &str) -> MeshResult<()> {
        self.health.stop_monitoring(service_id)
    }

    pub async fn manual_health_check(&self, service_id: &str) -> MeshResult<HealthCheckResult> {
        self.health.manual_check(service_id).await
    }

    pub fn all_health_statuses(&self) -> Vec<HealthSnapshot> {
        self.health.all_statuses()
    }

    /// Recent checks of one service with its success rate and uptime.
    pub fn health_history(&self, service_id: &str) -> MeshResult<HealthHistory> {
        self.health.history(service_id)
    }

    pub fn set_health_listener(&self, listener: Option<Box<dyn HealthListener>>) {
        self.notifier.set_health_listener(listener);
    }

    pub fn set_service_listener(&self, listener: Option<Box<dyn ServiceListener>>) {
        self.notifier.set_service_listener(listener);
    }

    // --- Load balancing ---

    pub fn select_service(&self, service_name: &str, client_id: Option<&str>) -> MeshResult<ServiceRecord> {
        self.balancer.select(service_name, client_id)
    }

    pub fn report_performance(&self, service_id: &str, response_time: Duration, success: bool) -> MeshResult<()> {
        self.balancer.report(service_id, response_time, success)
    }

    pub fn circuit_breaker_status(&self, service_id: &str) -> MeshResult<BreakerStatus> {
        self.breakers.status(service_id)
    }

    pub fn reset_circuit_breaker(&self, service_id: &str) -> MeshResult<()> {
        self.breakers.reset(service_id)
    }

    pub fn load_balancer_stats(&self, service_name: &str) -> MeshResult<SelectionStats> {
        self.balancer.stats(service_name)
    }

    pub fn service_weights(&self, service_name: &str) -> MeshResult<Vec<(String, u32)>> {
        self.balancer.weights(service_name)
    }

    // --- Statistics ---

    /// Aggregate snapshot across the registry and every service name.
    pub fn stats(&self) -> MeshStats {
        let mut stats = MeshStats {
            node_id: self.node_id.clone(),
            uptime: self.uptime(),
            open_circuit_breakers: self.breakers.open_count(),
            ..MeshStats::default()
        };

        for record in self.store.list_all() {
            stats.total_services += 1;
            match record.status {
                ServiceStatus::Healthy => stats.healthy_services += 1,
                ServiceStatus::Unhealthy => stats.unhealthy_services += 1,
                ServiceStatus::Degraded => stats.degraded_services += 1,
                ServiceStatus::Unknown => {}
            }
        }

        stats.absorb(&self.balancer.all_stats());
        stats
    }

    fn lifecycle(&self) -> MeshResult<MutexGuard<'_, Lifecycle>> {
        self.lifecycle
            .lock()
            .map_err(|_| MeshError::Internal("coordinator lifecycle lock poisoned".to_string()))
    }
}

impl Drop for MeshCoordinator {
    fn drop(&mut self) {
        // Probe tasks hold the monitor, not the coordinator.
        self.health.halt();
    }
}

impl std::fmt::Debug for MeshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshCoordinator")
            .field("node_id", &self.node_id)
            .field("state", &self.state())
            .field("services", &self.store.len())
            .finish()
    }
}

fn breaker_settings(config: &LoadBalancerConfig) -> BreakerSettings {
    BreakerSettings {
        threshold: config.circuit_breaker_threshold,
        timeout: config.circuit_breaker_timeout(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn coordinator() -> MeshCoordinator {
        MeshCoordinator::new(MeshConfig::default()).unwrap()
    }

    #[test]
    fn test_generated_node_id() {
        let a = coordinator();
        let b = coordinator();
        assert!(!a.node_id().is_empty());
        assert_ne!(a.node_id(), b.node_id());

        let named = MeshCoordinator::new(MeshConfig {
            node_id: "node-1".to_string(),
            ..MeshConfig::default()
        })
        .unwrap();
        assert_eq!(named.node_id(), "node-1");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = MeshConfig::default();
        config.health_check.interval_ms = 0;
        let err = MeshCoordinator::new(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let mesh = coordinator();
        assert_eq!(mesh.start().unwrap_err().kind(), ErrorKind::InternalError);
        assert_eq!(mesh.state(), CoordinatorState::Created);
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let mesh = coordinator();
        assert_eq!(mesh.uptime(), Duration::ZERO);
        mesh.stop().unwrap();
        assert_eq!(mesh.state(), CoordinatorState::Created);

        mesh.start().unwrap();
        mesh.start().unwrap();
        assert!(mesh.is_running());

        mesh.stop().unwrap();
        mesh.stop().unwrap();
        assert_eq!(mesh.state(), CoordinatorState::Stopped);

        mesh.start().unwrap();
        assert!(mesh.is_running());
    }

    #[test]
    fn test_register_applies_initial_status() {
        let mesh = coordinator();
        let mut record = ServiceRecord::new("svc", "a", "127.0.0.1", 80);
        record.status = ServiceStatus::Unhealthy;
        mesh.register_service(record).unwrap();

        assert_eq!(mesh.service("a").unwrap().status, ServiceStatus::Healthy);
        assert_eq!(mesh.circuit_breaker_status("a").unwrap().failure_count, 0);
        assert_eq!(mesh.select_service("svc", None).unwrap().service_id, "a");
    }

    #[test]
    fn test_failed_register_leaves_no_state() {
        let mesh = coordinator();
        let err = mesh
            .register_service(ServiceRecord::new("svc", "a", "127.0.0.1", 80).with_weight(0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
        assert_eq!(mesh.circuit_breaker_status("a").unwrap_err().kind(), ErrorKind::NotFound);
        assert!(mesh.all_services().is_empty());
    }

    #[test]
    fn test_unregister_cleans_up() {
        let mesh = coordinator();
        mesh.register_service(ServiceRecord::new("svc", "a", "127.0.0.1", 80)).unwrap();
        mesh.unregister_service("a").unwrap();

        assert_eq!(mesh.service("a").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(mesh.circuit_breaker_status("a").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(mesh.reset_circuit_breaker("a").unwrap_err().kind(), ErrorKind::NotFound);
        assert!(matches!(mesh.select_service("svc", None), Err(MeshError::ServiceNotFound(_))));
        assert_eq!(mesh.unregister_service("a").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_configure_validates_before_applying() {
        let mesh = coordinator();
        let health = HealthCheckConfig {
            interval_ms: 500,
            ..HealthCheckConfig::default()
        };
        let bad_lb = LoadBalancerConfig {
            circuit_breaker_threshold: 0,
            ..LoadBalancerConfig::default()
        };

        let err = mesh.configure(Some(health.clone()), Some(bad_lb)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
        assert_eq!(mesh.health_defaults(), HealthCheckConfig::default());

        mesh.configure(Some(health.clone()), None).unwrap();
        assert_eq!(mesh.health_defaults(), health);
        assert_eq!(mesh.load_balancer_config(), LoadBalancerConfig::default());
    }

    #[test]
    fn test_configure_updates_existing_breakers() {
        let mesh = coordinator();
        mesh.register_service(ServiceRecord::new("svc", "a", "127.0.0.1", 80)).unwrap();
        mesh.configure(
            None,
            Some(LoadBalancerConfig {
                circuit_breaker_threshold: 1,
                ..LoadBalancerConfig::default()
            }),
        )
        .unwrap();

        mesh.report_performance("a", Duration::from_millis(5), false).unwrap();
        assert!(mesh.circuit_breaker_status("a").unwrap().is_open);
    }

    #[test]
    fn test_stats_before_start() {
        let mesh = coordinator();
        let stats = mesh.stats();
        assert_eq!(stats.total_services, 0);
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.uptime, Duration::ZERO);
        assert_eq!(stats.node_id, mesh.node_id());
    }

    #[test]
    fn test_register_unregister_race_leaves_no_orphans() {
        let mesh = coordinator();

        for i in 0..500 {
            let id = format!("a{i}");
            std::thread::scope(|s| {
                s.spawn(|| {
                    let _ = mesh.register_service(ServiceRecord::new("svc", id.as_str(), "127.0.0.1", 80));
                });
                s.spawn(|| {
                    let _ = mesh.unregister_service(&id);
                });
            });

            let registered = mesh.service(&id).is_ok();
            assert_eq!(mesh.circuit_breaker_status(&id).is_ok(), registered, "breaker state of {id}");
            assert_eq!(mesh.balancer.tracks(&id), registered, "load state of {id}");
        }
    }

    #[test]
    fn test_duplicate_register_keeps_existing_state() {
        let mesh = coordinator();
        mesh.register_service(ServiceRecord::new("svc", "a", "127.0.0.1", 80)).unwrap();
        mesh.report_performance("a", Duration::from_millis(5), false).unwrap();

        let err = mesh
            .register_service(ServiceRecord::new("other", "a", "127.0.0.1", 81))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(mesh.circuit_breaker_status("a").unwrap().failure_count, 1);
        assert!(mesh.balancer.tracks("a"));
    }
}
