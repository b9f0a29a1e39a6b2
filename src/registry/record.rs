//! Service record abstraction.
//!
//! # Responsibilities
//! - Represent a single addressable service instance
//! - Carry health status and last observed response time
//! - Validate identity and weight at registration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{require_id, MeshError, MeshResult};

/// Health status of a service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Unknown,
    Healthy,
    Unhealthy,
    Degraded,
}

impl ServiceStatus {
    /// Whether an instance in this status may receive traffic.
    pub fn is_selectable(&self) -> bool {
        matches!(self, ServiceStatus::Healthy | ServiceStatus::Degraded)
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServiceStatus::Unknown => "unknown",
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Unhealthy => "unhealthy",
            ServiceStatus::Degraded => "degraded",
        };
        f.write_str(s)
    }
}

/// A registered service instance.
///
/// Values handed out by the registry are snapshots; mutating one has no
/// effect on the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceRecord {
    /// Logical service name shared by interchangeable instances.
    pub service_name: String,
    /// Globally unique instance id.
    pub service_id: String,
    pub endpoint: String,
    pub port: u16,
    /// Relative weight for weighted algorithms (>= 1).
    pub weight: u32,
    pub status: ServiceStatus,
    /// Opaque caller-owned metadata.
    pub metadata: serde_json::Value,
    pub last_response_time: Option<Duration>,
}

impl ServiceRecord {
    /// Create a record with weight 1, no metadata and `Unknown` status.
    pub fn new(
        service_name: impl Into<String>,
        service_id: impl Into<String>,
        endpoint: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            service_id: service_id.into(),
            endpoint: endpoint.into(),
            port,
            weight: 1,
            status: ServiceStatus::Unknown,
            metadata: serde_json::Value::Null,
            last_response_time: None,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// `endpoint:port` form used for probing and logging.
    pub fn address(&self) -> String {
        format!("{}:{}", self.endpoint, self.port)
    }

    /// Check identifiers and weight before the record enters the registry.
    pub fn validate(&self) -> MeshResult<()> {
        require_id(&self.service_name, "service_name")?;
        require_id(&self.service_id, "service_id")?;
        require_id(&self.endpoint, "endpoint")?;
        if self.weight == 0 {
            return Err(MeshError::Configuration(format!(
                "service {} has zero weight",
                self.service_id
            )));
        }
        Ok(())
    }
}

/// Parse caller-supplied metadata text. Empty text means no metadata.
pub fn metadata_from_json(text: &str) -> MeshResult<serde_json::Value> {
    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(text)
        .map_err(|e| MeshError::InvalidArgument(format!("metadata is not valid JSON: {}", e)))
}
