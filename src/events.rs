//! Change notifications.
//!
//! Two channels exist: health status changes and service set changes. Each
//! holds at most one subscriber; subscribing again replaces the previous one.
//! Listeners are invoked synchronously on the task that detected the change.

use arc_swap::ArcSwapOption;
use std::sync::Arc;

use crate::registry::{ServiceRecord, ServiceStatus};

/// Receives health status transitions.
///
/// Called while the service's health state is locked, which is what keeps
/// transitions for one service in order. Implementations must not call
/// health monitoring operations for the same service, or unregister it,
/// synchronously.
pub trait HealthListener: Send + Sync {
    fn on_status_change(&self, service_id: &str, previous: ServiceStatus, current: ServiceStatus);
}

impl<F> HealthListener for F
where
    F: Fn(&str, ServiceStatus, ServiceStatus) + Send + Sync,
{
    fn on_status_change(&self, service_id: &str, previous: ServiceStatus, current: ServiceStatus) {
        self(service_id, previous, current)
    }
}

/// Receives registrations and unregistrations.
///
/// Called while the service id's membership is locked, so events for one id
/// arrive in order. Implementations must not register, unregister or start
/// monitoring that id synchronously.
pub trait ServiceListener: Send + Sync {
    fn on_registered(&self, _record: &ServiceRecord) {}

    fn on_unregistered(&self, _record: &ServiceRecord) {}
}

/// Holds the current subscriber of each channel.
#[derive(Default)]
pub struct Notifier {
    health: ArcSwapOption<Box<dyn HealthListener>>,
    services: ArcSwapOption<Box<dyn ServiceListener>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the health subscriber. `None` unsubscribes.
    pub fn set_health_listener(&self, listener: Option<Box<dyn HealthListener>>) {
        self.health.store(listener.map(Arc::new));
    }

    /// Replace the service set subscriber. `None` unsubscribes.
    pub fn set_service_listener(&self, listener: Option<Box<dyn ServiceListener>>) {
        self.services.store(listener.map(Arc::new));
    }

    pub fn status_changed(&self, service_id: &str, previous: ServiceStatus, current: ServiceStatus) {
        if let Some(listener) = self.health.load_full() {
            listener.on_status_change(service_id, previous, current);
        }
    }

    pub fn registered(&self, record: &ServiceRecord) {
        if let Some(listener) = self.services.load_full() {
            listener.on_registered(record);
        }
    }

    pub fn unregistered(&self, record: &ServiceRecord) {
        if let Some(listener) = self.services.load_full() {
            listener.on_unregistered(record);
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("health", &self.health.load().is_some())
            .field("services", &self.services.load().is_some())
            .finish()
    }
}
