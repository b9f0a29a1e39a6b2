//! Service pool selection.
//!
//! # Responsibilities
//! - Build the candidate set of a service name from the registry and breakers
//! - Keep one selector and one stats record per service name
//! - Track per-instance load for the load-aware algorithms
//! - Route performance reports to stats, breakers and the registry

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::validation::validate_load_balancer;
use crate::config::LoadBalancerConfig;
use crate::error::{require_id, MeshError, MeshResult};
use crate::load_balancer::{
    build_selector, selector_changed,
    instance::{Candidate, InstanceLoad},
    stats::SelectionStats,
    SelectionRequest, Selector,
};
use crate::observability::metrics;
use crate::registry::{ServiceRecord, ServiceStore};
use crate::resilience::CircuitBreakerBank;

/// Algorithm state of one service name.
#[derive(Debug)]
struct GroupState {
    config: Arc<LoadBalancerConfig>,
    selector: Box<dyn Selector>,
    /// `None` until the first successful selection.
    stats: Option<SelectionStats>,
}

impl GroupState {
    fn new(config: Arc<LoadBalancerConfig>) -> Self {
        Self {
            selector: build_selector(&config),
            config,
            stats: None,
        }
    }

    fn sync_config(&mut self, service_name: &str, config: &Arc<LoadBalancerConfig>) {
        if Arc::ptr_eq(&self.config, config) {
            return;
        }
        if selector_changed(&self.config, config) {
            tracing::debug!(
                service_name = %service_name,
                algorithm = config.algorithm.as_str(),
                "Selector rebuilt"
            );
            self.selector = build_selector(config);
        }
        self.config = Arc::clone(config);
    }
}

/// Selects instances of a service name and tracks selection statistics.
#[derive(Debug)]
pub struct LoadBalancer {
    store: Arc<ServiceStore>,
    breakers: Arc<CircuitBreakerBank>,
    config: ArcSwap<LoadBalancerConfig>,
    groups: DashMap<String, GroupState>,
    instances: DashMap<String, Arc<InstanceLoad>>,
}

impl LoadBalancer {
    pub fn new(store: Arc<ServiceStore>, breakers: Arc<CircuitBreakerBank>, config: LoadBalancerConfig) -> Self {
        Self {
            store,
            breakers,
            config: ArcSwap::from_pointee(config),
            groups: DashMap::new(),
            instances: DashMap::new(),
        }
    }

    pub fn config(&self) -> LoadBalancerConfig {
        self.config.load().as_ref().clone()
    }

    /// Replace the defaults. Selectors pick the change up on their next call.
    pub fn set_config(&self, config: LoadBalancerConfig) -> MeshResult<()> {
        validate_load_balancer(&config)?;
        self.config.store(Arc::new(config));
        Ok(())
    }

    /// Start tracking load for a newly registered instance.
    pub fn track(&self, service_id: &str) {
        self.instances
            .entry(service_id.to_string())
            .or_insert_with(|| Arc::new(InstanceLoad::new()));
    }

    /// Drop the load counters of an unregistered instance.
    pub fn forget(&self, service_id: &str) {
        self.instances.remove(service_id);
    }

    /// Pick one healthy instance of `service_name`.
    pub fn select(&self, service_name: &str, client_id: Option<&str>) -> MeshResult<ServiceRecord> {
        require_id(service_name, "service_name")?;
        let client_id = client_id.filter(|c| !c.is_empty());
        let config = self.config.load_full();

        let members = self.store.list_by_name(service_name)?;
        if members.is_empty() {
            metrics::record_selection_failure("service_not_found");
            return Err(MeshError::ServiceNotFound(service_name.to_string()));
        }

        let candidates: Vec<Candidate> = members
            .iter()
            .filter(|r| r.status.is_selectable())
            .filter(|r| !config.enable_circuit_breaker || !self.breakers.is_open(&r.service_id))
            .map(|r| Candidate {
                record: r.clone(),
                load: self.load_of(&r.service_id),
            })
            .collect();

        if candidates.is_empty() {
            tracing::warn!(
                service_name = %service_name,
                registered = members.len(),
                "No healthy instances available"
            );
            metrics::record_selection_failure("no_healthy_instances");
            return Err(MeshError::NoHealthyInstances(service_name.to_string()));
        }

        let member_ids: Vec<String> = members.into_iter().map(|r| r.service_id).collect();
        let request = SelectionRequest {
            client_id,
            members: &member_ids,
        };

        let chosen = {
            let mut group = self
                .groups
                .entry(service_name.to_string())
                .or_insert_with(|| GroupState::new(Arc::clone(&config)));
            group.sync_config(service_name, &config);

            let chosen = group
                .selector
                .select(&candidates, &request)
                .and_then(|i| candidates.get(i))
                .ok_or_else(|| {
                    MeshError::Internal(format!("selector returned no instance for '{service_name}'"))
                })?;

            chosen.load.begin();
            group
                .stats
                .get_or_insert_with(|| SelectionStats::new(service_name, config.algorithm))
                .record_selection(chosen.service_id(), config.algorithm);
            chosen
        };

        tracing::debug!(
            service_name = %service_name,
            service_id = %chosen.service_id(),
            algorithm = config.algorithm.as_str(),
            candidates = candidates.len(),
            "Instance selected"
        );
        metrics::record_selection(service_name, config.algorithm.as_str());
        Ok(chosen.record.clone())
    }

    /// Record the outcome of a request sent to `service_id`.
    pub fn report(&self, service_id: &str, response_time: Duration, success: bool) -> MeshResult<()> {
        require_id(service_id, "service_id")?;
        let record = self.store.get(service_id)?;
        let config = self.config.load();

        self.breakers.report(service_id, response_time, success)?;

        if let Some(load) = self.instances.get(service_id) {
            load.finish(success, response_time, config.response_time_alpha, config.success_window);
        }

        if let Some(mut group) = self.groups.get_mut(&record.service_name) {
            if let Some(stats) = group.stats.as_mut() {
                stats.record_report(success, response_time, config.response_time_alpha);
            }
        }

        self.store.update_response_time(service_id, response_time)?;
        metrics::record_response_time(response_time);
        tracing::debug!(
            service_id = %service_id,
            response_time_ms = response_time.as_millis() as u64,
            success,
            "Performance reported"
        );
        Ok(())
    }

    /// Stats of a service name that has been selected from at least once.
    pub fn stats(&self, service_name: &str) -> MeshResult<SelectionStats> {
        require_id(service_name, "service_name")?;
        self.groups
            .get(service_name)
            .and_then(|group| group.stats.clone())
            .ok_or_else(|| MeshError::ServiceNotFound(service_name.to_string()))
    }

    /// Stats of every service name selected from so far, sorted by name.
    pub fn all_stats(&self) -> Vec<SelectionStats> {
        let mut all: Vec<SelectionStats> = self
            .groups
            .iter()
            .filter_map(|group| group.stats.clone())
            .collect();
        all.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        all
    }

    /// `(service_id, weight)` of every instance of `service_name`, in registration order.
    pub fn weights(&self, service_name: &str) -> MeshResult<Vec<(String, u32)>> {
        require_id(service_name, "service_name")?;
        Ok(self
            .store
            .list_by_name(service_name)?
            .into_iter()
            .map(|r| (r.service_id, r.weight))
            .collect())
    }

    /// In-flight selections of one instance.
    /// Whether load counters exist for `service_id`.
    pub fn tracks(&self, service_id: &str) -> bool {
        self.instances.contains_key(service_id)
    }

    pub fn in_flight(&self, service_id: &str) -> usize {
        self.instances.get(service_id).map(|l| l.in_flight()).unwrap_or(0)
    }

    fn load_of(&self, service_id: &str) -> Arc<InstanceLoad> {
        // Not inserted on a miss so a concurrent unregister is not undone.
        self.instances
            .get(service_id)
            .map(|l| l.value().clone())
            .unwrap_or_default()
    }
}
