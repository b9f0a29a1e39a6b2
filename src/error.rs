//! Error types shared by every subsystem.
//!
//! Each variant maps onto exactly one [`ErrorKind`], which is what a foreign
//! binding turns into a status code.

use std::time::Duration;
use thiserror::Error;

/// Coarse error classification exposed across the binding boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    Timeout,
    HealthCheckFailed,
    ConfigurationError,
    InternalError,
}

/// Errors that can occur during mesh operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MeshError {
    /// Malformed or empty identifier, or an out-of-range argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No service is registered under this id.
    #[error("service id not found: {0}")]
    NotFound(String),

    /// No service is registered (or was ever selected from) under this name.
    #[error("service name not found: {0}")]
    ServiceNotFound(String),

    /// A service with this id is already registered.
    #[error("service id already registered: {0}")]
    AlreadyExists(String),

    /// A probe or deadline-bound call did not finish in time.
    #[error("operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Every registered instance was filtered out by health or breaker state.
    #[error("no healthy instances for service: {0}")]
    NoHealthyInstances(String),

    /// Inconsistent configuration (zero interval, zero weight, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invariant violation. Never expected in normal operation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MeshError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeshError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            MeshError::NotFound(_) | MeshError::ServiceNotFound(_) => ErrorKind::NotFound,
            MeshError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            MeshError::Timeout(_) => ErrorKind::Timeout,
            MeshError::NoHealthyInstances(_) => ErrorKind::HealthCheckFailed,
            MeshError::Configuration(_) => ErrorKind::ConfigurationError,
            MeshError::Internal(_) => ErrorKind::InternalError,
        }
    }
}

/// Result type for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Reject empty identifiers at entry points.
pub(crate) fn require_id(value: &str, what: &str) -> MeshResult<()> {
    if value.trim().is_empty() {
        return Err(MeshError::InvalidArgument(format!("{} must not be empty", what)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(MeshError::NotFound("a".into()).kind(), ErrorKind::NotFound);
        assert_eq!(MeshError::ServiceNotFound("svc".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            MeshError::NoHealthyInstances("svc".into()).kind(),
            ErrorKind::HealthCheckFailed
        );
        assert_eq!(
            MeshError::Configuration("zero interval".into()).kind(),
            ErrorKind::ConfigurationError
        );
    }

    #[test]
    fn test_error_display() {
        let err = MeshError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "operation timed out after 250ms");

        let err = MeshError::AlreadyExists("svc-1".into());
        assert!(err.to_string().contains("svc-1"));
    }

    #[test]
    fn test_require_id() {
        assert!(require_id("svc-1", "service_id").is_ok());
        assert_eq!(
            require_id("  ", "service_id").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }
}
