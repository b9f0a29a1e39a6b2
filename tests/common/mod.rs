//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mesh_coordinator::config::{HealthCheckConfig, MeshConfig};
use mesh_coordinator::events::{HealthListener, ServiceListener};
use mesh_coordinator::health::{ProbeOutcome, Prober};
use mesh_coordinator::{MeshCoordinator, ServiceRecord, ServiceStatus};

/// In-memory prober driven by per-service scripts.
///
/// A service answers from its queued script first, then repeats its steady
/// outcome (`Up` unless set otherwise). Hanging services never answer;
/// slow services answer after their delay.
#[derive(Default)]
pub struct ScriptedProber {
    scripts: Mutex<HashMap<String, VecDeque<ProbeOutcome>>>,
    steady: Mutex<HashMap<String, ProbeOutcome>>,
    hanging: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl ScriptedProber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, service_id: &str, outcome: ProbeOutcome) {
        self.steady.lock().unwrap().insert(service_id.to_string(), outcome);
    }

    pub fn script(&self, service_id: &str, outcomes: &[ProbeOutcome]) {
        self.scripts
            .lock()
            .unwrap()
            .entry(service_id.to_string())
            .or_default()
            .extend(outcomes.iter().copied());
    }

    pub fn hang(&self, service_id: &str) {
        self.hanging.lock().unwrap().insert(service_id.to_string());
    }

    pub fn slow(&self, service_id: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(service_id.to_string(), delay);
    }

    pub fn calls(&self, service_id: &str) -> usize {
        self.calls.lock().unwrap().get(service_id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, target: &ServiceRecord) -> ProbeOutcome {
        let id = target.service_id.clone();
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(id.clone()).or_default() += 1;

        if self.hanging.lock().unwrap().contains(&id) {
            std::future::pending::<()>().await;
        }
        let delay = self.delays.lock().unwrap().get(&id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(next) = self.scripts.lock().unwrap().get_mut(&id).and_then(|q| q.pop_front()) {
            return next;
        }
        self.steady
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .unwrap_or(ProbeOutcome::Up)
    }
}

/// Records every health transition it receives.
#[derive(Clone, Default)]
pub struct HealthRecorder {
    events: Arc<Mutex<Vec<(String, ServiceStatus, ServiceStatus)>>>,
}

impl HealthRecorder {
    pub fn events(&self) -> Vec<(String, ServiceStatus, ServiceStatus)> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_for(&self, service_id: &str) -> Vec<(ServiceStatus, ServiceStatus)> {
        self.events()
            .into_iter()
            .filter(|(id, _, _)| id == service_id)
            .map(|(_, from, to)| (from, to))
            .collect()
    }
}

impl HealthListener for HealthRecorder {
    fn on_status_change(&self, service_id: &str, previous: ServiceStatus, current: ServiceStatus) {
        self.events
            .lock()
            .unwrap()
            .push((service_id.to_string(), previous, current));
    }
}

/// Records registrations (`+id`) and unregistrations (`-id`).
#[derive(Clone, Default)]
pub struct ServiceRecorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl ServiceRecorder {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ServiceListener for ServiceRecorder {
    fn on_registered(&self, record: &ServiceRecord) {
        self.events.lock().unwrap().push(format!("+{}", record.service_id));
    }

    fn on_unregistered(&self, record: &ServiceRecord) {
        self.events.lock().unwrap().push(format!("-{}", record.service_id));
    }
}

/// Fast health config for tests.
pub fn fast_health(max_failures: u32, recovery_checks: u32) -> HealthCheckConfig {
    HealthCheckConfig {
        interval_ms: 20,
        timeout_ms: 100,
        max_failures,
        recovery_checks,
    }
}

pub fn mesh_with(prober: Arc<ScriptedProber>, config: MeshConfig) -> MeshCoordinator {
    MeshCoordinator::with_prober(config, prober).unwrap()
}

pub fn mesh(prober: Arc<ScriptedProber>) -> MeshCoordinator {
    mesh_with(prober, MeshConfig::default())
}

pub fn record(name: &str, id: &str, weight: u32) -> ServiceRecord {
    ServiceRecord::new(name, id, "127.0.0.1", 8080).with_weight(weight)
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Run `fut` with a hard upper bound so a hang fails the test instead of stalling it.
pub async fn bounded<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("operation did not finish in time")
}
