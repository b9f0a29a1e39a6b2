//! Active health checking.
//!
//! # Responsibilities
//! - Run one probe task per monitored service
//! - Feed probe outcomes through the state machine in state.rs
//! - Write status changes to the registry and notify the health listener
//! - Serve out-of-band manual checks
//! - Keep a bounded history of applied checks per service
//!
//! # Locking
//! Each service has its own tracker mutex. Applying a probe result (status
//! write + notification) and cancelling that service's task both happen under
//! it, so once `stop_monitoring` or `forget` returns no stale result can
//! land. Probes themselves run without any lock held. `all_statuses` is the
//! only caller holding several tracker locks, and takes them in id order.

use arc_swap::{ArcSwap, ArcSwapOption};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::validation::validate_health;
use crate::config::HealthCheckConfig;
use crate::error::{require_id, MeshError, MeshResult};
use crate::events::Notifier;
use crate::health::history::{CheckLog, HealthCheckEntry, HealthHistory};
use crate::health::probe::{ProbeOutcome, Prober};
use crate::health::state::HealthTracker;
use crate::observability::metrics;
use crate::registry::{ServiceStatus, ServiceStore};
use crate::resilience::timeouts::with_deadline;

/// Outcome of a manual check.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct HealthCheckResult {
    pub service_id: String,
    pub status: ServiceStatus,
    pub response_time: Duration,
}

/// Point-in-time health of one monitored service.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct HealthSnapshot {
    pub service_id: String,
    pub service_name: String,
    pub status: ServiceStatus,
    pub last_response_time: Option<Duration>,
}

struct MonitorTask {
    generation: u64,
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

struct MonitorEntry {
    config: HealthCheckConfig,
    generation: u64,
    task: Option<MonitorTask>,
}

#[derive(Debug, Default)]
struct ServiceHealth {
    tracker: HealthTracker,
    log: CheckLog,
}

type TrackerSlot = Arc<Mutex<ServiceHealth>>;

pub struct HealthMonitor {
    store: Arc<ServiceStore>,
    prober: Arc<dyn Prober>,
    notifier: Arc<Notifier>,
    defaults: ArcSwap<HealthCheckConfig>,
    monitors: DashMap<String, MonitorEntry>,
    trackers: DashMap<String, TrackerSlot>,
    runtime: ArcSwapOption<Handle>,
    generations: AtomicU64,
}

impl HealthMonitor {
    pub fn new(
        store: Arc<ServiceStore>,
        prober: Arc<dyn Prober>,
        notifier: Arc<Notifier>,
        defaults: HealthCheckConfig,
    ) -> Self {
        Self {
            store,
            prober,
            notifier,
            defaults: ArcSwap::from_pointee(defaults),
            monitors: DashMap::new(),
            trackers: DashMap::new(),
            runtime: ArcSwapOption::empty(),
            generations: AtomicU64::new(0),
        }
    }

    pub fn defaults(&self) -> HealthCheckConfig {
        self.defaults.load().as_ref().clone()
    }

    pub fn set_defaults(&self, config: HealthCheckConfig) -> MeshResult<()> {
        validate_health(&config)?;
        self.defaults.store(Arc::new(config));
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.runtime.load().is_some()
    }

    /// Spawn probe tasks for every monitored service on `runtime`.
    pub fn run(self: &Arc<Self>, runtime: Handle) {
        self.runtime.store(Some(Arc::new(runtime.clone())));
        for mut entry in self.monitors.iter_mut() {
            if entry.task.is_none() {
                let service_id = entry.key().clone();
                let generation = entry.generation;
                let config = entry.config.clone();
                entry.task = Some(self.spawn_probe_loop(&runtime, &service_id, config, generation));
            }
        }
        tracing::info!(monitored = self.monitors.len(), "Health monitor running");
    }

    /// Cancel every probe task. Monitoring configuration is kept for a later `run`.
    pub fn halt(&self) {
        self.runtime.store(None);
        for mut entry in self.monitors.iter_mut() {
            if let Some(task) = entry.task.take() {
                self.cancel(entry.key(), task);
            }
        }
        tracing::info!("Health monitor halted");
    }

    /// Begin (or restart with a new config) periodic probing of `service_id`.
    pub fn start_monitoring(self: &Arc<Self>, service_id: &str, config: HealthCheckConfig) -> MeshResult<()> {
        require_id(service_id, "service_id")?;
        validate_health(&config)?;
        if !self.store.contains(service_id) {
            return Err(MeshError::NotFound(service_id.to_string()));
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let mut entry = self
            .monitors
            .entry(service_id.to_string())
            .or_insert_with(|| MonitorEntry {
                config: config.clone(),
                generation,
                task: None,
            });

        if let Some(task) = entry.task.take() {
            self.cancel(service_id, task);
        }
        lock_tracker(&self.tracker(service_id)).tracker.reset();

        entry.config = config.clone();
        entry.generation = generation;
        if let Some(runtime) = self.runtime.load_full() {
            entry.task = Some(self.spawn_probe_loop(&runtime, service_id, config.clone(), generation));
        }
        drop(entry);

        tracing::info!(
            service_id = %service_id,
            interval_ms = config.interval_ms,
            timeout_ms = config.timeout_ms,
            "Health monitoring started"
        );
        Ok(())
    }

    /// Stop periodic probing. A no-op for services that are not monitored.
    pub fn stop_monitoring(&self, service_id: &str) -> MeshResult<()> {
        require_id(service_id, "service_id")?;
        if let Some((_, entry)) = self.monitors.remove(service_id) {
            if let Some(task) = entry.task {
                self.cancel(service_id, task);
            }
            tracing::info!(service_id = %service_id, "Health monitoring stopped");
        }
        Ok(())
    }

    /// Drop all monitoring state of an unregistered service.
    ///
    /// Waits for a result being applied to finish, so no notification for the
    /// service is delivered after this returns.
    pub fn forget(&self, service_id: &str) {
        if let Some((_, entry)) = self.monitors.remove(service_id) {
            if let Some(task) = entry.task {
                self.cancel(service_id, task);
            }
        }
        if let Some((_, slot)) = self.trackers.remove(service_id) {
            drop(lock_tracker(&slot));
        }
    }

    pub fn is_monitored(&self, service_id: &str) -> bool {
        self.monitors.contains_key(service_id)
    }

    /// Config used for `service_id`: its monitor's, or the defaults.
    pub fn config_for(&self, service_id: &str) -> HealthCheckConfig {
        self.monitors
            .get(service_id)
            .map(|entry| entry.config.clone())
            .unwrap_or_else(|| self.defaults())
    }

    /// Probe once, out of band, and apply the result.
    pub async fn manual_check(&self, service_id: &str) -> MeshResult<HealthCheckResult> {
        require_id(service_id, "service_id")?;
        let config = self.config_for(service_id);
        self.check_once(service_id, &config, None)
            .await?
            .ok_or_else(|| MeshError::Internal("manual check was cancelled".to_string()))
    }

    /// Health of every monitored service still registered, sorted by id.
    ///
    /// Probe results are applied under the tracker locks, and all of them are
    /// held while reading, so the statuses come from one point in time.
    pub fn all_statuses(&self) -> Vec<HealthSnapshot> {
        let mut ids: Vec<String> = self.monitors.iter().map(|e| e.key().clone()).collect();
        ids.sort();

        let slots: Vec<(String, TrackerSlot)> = ids
            .into_iter()
            .filter_map(|id| {
                let slot = self.trackers.get(&id).map(|s| s.value().clone())?;
                Some((id, slot))
            })
            .collect();
        let _guards: Vec<MutexGuard<'_, ServiceHealth>> =
            slots.iter().map(|(_, slot)| lock_tracker(slot)).collect();

        slots
            .iter()
            .filter_map(|(id, _)| self.store.get(id).ok())
            .map(|record| HealthSnapshot {
                service_id: record.service_id,
                service_name: record.service_name,
                status: record.status,
                last_response_time: record.last_response_time,
            })
            .collect()
    }

    /// Recent checks of a registered service. Empty until its first check.
    pub fn history(&self, service_id: &str) -> MeshResult<HealthHistory> {
        require_id(service_id, "service_id")?;
        if !self.store.contains(service_id) {
            return Err(MeshError::NotFound(service_id.to_string()));
        }
        let slot = self.trackers.get(service_id).map(|s| s.value().clone());
        Ok(match slot {
            Some(slot) => lock_tracker(&slot).log.report(service_id),
            None => CheckLog::default().report(service_id),
        })
    }

    fn tracker(&self, service_id: &str) -> TrackerSlot {
        self.trackers
            .entry(service_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    fn cancel(&self, service_id: &str, task: MonitorTask) {
        let slot = self.tracker(service_id);
        {
            let _tracker = lock_tracker(&slot);
            task.cancelled.store(true, Ordering::SeqCst);
        }
        task.handle.abort();
    }

    fn spawn_probe_loop(
        self: &Arc<Self>,
        runtime: &Handle,
        service_id: &str,
        config: HealthCheckConfig,
        generation: u64,
    ) -> MonitorTask {
        let cancelled = Arc::new(AtomicBool::new(false));
        let monitor = Arc::clone(self);
        let id = service_id.to_string();
        let flag = Arc::clone(&cancelled);

        let handle = runtime.spawn(async move {
            monitor.probe_loop(id, config, generation, flag).await;
        });

        MonitorTask {
            generation,
            cancelled,
            handle,
        }
    }

    async fn probe_loop(
        &self,
        service_id: String,
        config: HealthCheckConfig,
        generation: u64,
        cancelled: Arc<AtomicBool>,
    ) {
        let mut ticker = time::interval(config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if cancelled.load(Ordering::SeqCst) {
                break;
            }

            match self.check_once(&service_id, &config, Some(&cancelled)).await {
                Ok(Some(_)) | Err(MeshError::Timeout(_)) => {}
                Ok(None) => break,
                Err(MeshError::NotFound(_)) => {
                    // Unregistered mid-probe; unregister already cleaned up.
                    self.monitors.remove_if(&service_id, |_, entry| {
                        entry.task.as_ref().map(|t| t.generation) == Some(generation)
                    });
                    break;
                }
                Err(e) => {
                    tracing::debug!(service_id = %service_id, error = %e, "Probe task terminated");
                    break;
                }
            }
        }
    }

    /// Probe, then apply. `Ok(None)` means the owning task was cancelled first.
    async fn check_once(
        &self,
        service_id: &str,
        config: &HealthCheckConfig,
        cancelled: Option<&AtomicBool>,
    ) -> MeshResult<Option<HealthCheckResult>> {
        let record = self.store.get(service_id)?;

        let started = Instant::now();
        let probed = with_deadline(config.timeout(), self.prober.probe(&record)).await;
        let response_time = started.elapsed();

        let outcome = match &probed {
            Ok(outcome) => *outcome,
            Err(_) => {
                tracing::warn!(
                    service_id = %service_id,
                    timeout_ms = config.timeout_ms,
                    "Health check failed: timeout"
                );
                metrics::record_health_check("timeout");
                ProbeOutcome::Down
            }
        };

        let status = self.apply(service_id, outcome, probed.is_ok().then_some(response_time), config, cancelled)?;
        probed?;

        Ok(status.map(|status| HealthCheckResult {
            service_id: service_id.to_string(),
            status,
            response_time,
        }))
    }

    fn apply(
        &self,
        service_id: &str,
        outcome: ProbeOutcome,
        response_time: Option<Duration>,
        config: &HealthCheckConfig,
        cancelled: Option<&AtomicBool>,
    ) -> MeshResult<Option<ServiceStatus>> {
        let slot = self.tracker(service_id);
        let mut health = lock_tracker(&slot);
        if cancelled.is_some_and(|c| c.load(Ordering::SeqCst)) {
            return Ok(None);
        }

        let current = match self.store.get(service_id) {
            Ok(record) => record.status,
            Err(e) => {
                // Unregistered meanwhile; drop the slot this call recreated.
                drop(health);
                self.trackers.remove_if(service_id, |_, s| Arc::ptr_eq(s, &slot));
                return Err(e);
            }
        };
        let next = health.tracker.observe(current, outcome, config);
        health.log.push(HealthCheckEntry {
            checked_at: SystemTime::now(),
            outcome,
            status: next,
            response_time,
        });

        if let Some(rt) = response_time {
            self.store.update_response_time(service_id, rt)?;
            metrics::record_health_check(outcome.as_str());
        }

        if next != current {
            self.store.update_status(service_id, next)?;
            match next {
                ServiceStatus::Unhealthy => tracing::warn!(
                    service_id = %service_id,
                    from = %current,
                    "Service marked unhealthy"
                ),
                _ => tracing::info!(
                    service_id = %service_id,
                    from = %current,
                    to = %next,
                    "Service health changed"
                ),
            }
            metrics::record_service_health(service_id, next.is_selectable());
            self.notifier.status_changed(service_id, current, next);
        }

        Ok(Some(next))
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("monitored", &self.monitors.len())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Counters and a log, consistent after every push, so a poisoned lock is recovered.
fn lock_tracker(slot: &TrackerSlot) -> MutexGuard<'_, ServiceHealth> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
