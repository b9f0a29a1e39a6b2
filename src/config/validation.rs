//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, rates within bounds)
//! - Detect duplicate seeded service ids
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - The same section checks back runtime `configure()` calls

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::{HealthCheckConfig, LoadBalancerConfig, MeshConfig, ServiceSeed};
use crate::error::MeshError;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a complete configuration.
pub fn validate_config(config: &MeshConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_health(&config.health_check, "health_check", &mut errors);
    check_load_balancer(&config.load_balancer, "load_balancer", &mut errors);
    check_seeds(&config.services, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a health check section on its own.
pub fn validate_health(config: &HealthCheckConfig) -> Result<(), MeshError> {
    let mut errors = Vec::new();
    check_health(config, "health_check", &mut errors);
    into_mesh_error(errors)
}

/// Validate a load balancer section on its own.
pub fn validate_load_balancer(config: &LoadBalancerConfig) -> Result<(), MeshError> {
    let mut errors = Vec::new();
    check_load_balancer(config, "load_balancer", &mut errors);
    into_mesh_error(errors)
}

fn into_mesh_error(errors: Vec<ValidationError>) -> Result<(), MeshError> {
    if errors.is_empty() {
        return Ok(());
    }
    let joined = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Err(MeshError::Configuration(joined))
}

fn check_health(config: &HealthCheckConfig, prefix: &str, errors: &mut Vec<ValidationError>) {
    if config.interval_ms == 0 {
        errors.push(ValidationError::new(format!("{prefix}.interval_ms"), "must be greater than zero"));
    }
    if config.timeout_ms == 0 {
        errors.push(ValidationError::new(format!("{prefix}.timeout_ms"), "must be greater than zero"));
    }
    if config.max_failures == 0 {
        errors.push(ValidationError::new(format!("{prefix}.max_failures"), "must be at least 1"));
    }
    if config.recovery_checks == 0 {
        errors.push(ValidationError::new(format!("{prefix}.recovery_checks"), "must be at least 1"));
    }
}

fn check_load_balancer(config: &LoadBalancerConfig, prefix: &str, errors: &mut Vec<ValidationError>) {
    if config.circuit_breaker_threshold == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.circuit_breaker_threshold"),
            "must be at least 1",
        ));
    }
    if config.circuit_breaker_timeout_ms == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.circuit_breaker_timeout_ms"),
            "must be greater than zero",
        ));
    }
    if config.hash_replicas == 0 {
        errors.push(ValidationError::new(format!("{prefix}.hash_replicas"), "must be at least 1"));
    }
    if !(config.response_time_alpha > 0.0 && config.response_time_alpha <= 1.0) {
        errors.push(ValidationError::new(
            format!("{prefix}.response_time_alpha"),
            "must be within (0, 1]",
        ));
    }
    if config.success_window == 0 {
        errors.push(ValidationError::new(format!("{prefix}.success_window"), "must be at least 1"));
    }
    if !(0.0..=1.0).contains(&config.min_success_rate) {
        errors.push(ValidationError::new(
            format!("{prefix}.min_success_rate"),
            "must be within [0, 1]",
        ));
    }
}

fn check_seeds(seeds: &[ServiceSeed], errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for (i, seed) in seeds.iter().enumerate() {
        if seed.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("services[{i}].name"), "must not be empty"));
        }
        if seed.id.trim().is_empty() {
            errors.push(ValidationError::new(format!("services[{i}].id"), "must not be empty"));
        } else if !seen.insert(seed.id.as_str()) {
            errors.push(ValidationError::new(
                format!("services[{i}].id"),
                format!("duplicate service id '{}'", seed.id),
            ));
        }
        if seed.weight == 0 {
            errors.push(ValidationError::new(format!("services[{i}].weight"), "must be at least 1"));
        }
    }
}
