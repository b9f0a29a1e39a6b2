//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mesh_services_registered` (gauge): current registry size
//! - `mesh_service_health` (gauge): 1=healthy/degraded, 0=otherwise, per service id
//! - `mesh_health_checks_total` (counter): probes by outcome
//! - `mesh_selections_total` (counter): selections by service name and algorithm
//! - `mesh_selection_failures_total` (counter): failed selections by reason
//! - `mesh_reported_response_time_ms` (histogram): reported response times
//! - `mesh_circuit_breaker_transitions_total` (counter): breaker transitions by target state
//!
//! Recording without an installed recorder is a no-op, so the library never
//! requires an exporter.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_registry_size(size: usize) {
    metrics::gauge!("mesh_services_registered").set(size as f64);
}

pub fn record_service_health(service_id: &str, selectable: bool) {
    metrics::gauge!("mesh_service_health", "service_id" => service_id.to_string())
        .set(if selectable { 1.0 } else { 0.0 });
}

pub fn record_health_check(outcome: &'static str) {
    metrics::counter!("mesh_health_checks_total", "outcome" => outcome).increment(1);
}

pub fn record_selection(service_name: &str, algorithm: &'static str) {
    metrics::counter!(
        "mesh_selections_total",
        "service_name" => service_name.to_string(),
        "algorithm" => algorithm
    )
    .increment(1);
}

pub fn record_selection_failure(reason: &'static str) {
    metrics::counter!("mesh_selection_failures_total", "reason" => reason).increment(1);
}

pub fn record_response_time(response_time: Duration) {
    metrics::histogram!("mesh_reported_response_time_ms").record(response_time.as_secs_f64() * 1000.0);
}

pub fn record_breaker_transition(to_state: &'static str) {
    metrics::counter!("mesh_circuit_breaker_transitions_total", "state" => to_state).increment(1);
}
