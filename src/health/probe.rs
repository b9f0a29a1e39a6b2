//! Probing capability.
//!
//! The monitor never talks to the network itself; it calls a [`Prober`]
//! under a deadline. [`TcpProber`] is the default used by the daemon.

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::registry::ServiceRecord;

/// Result of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Up,
    /// Reachable but impaired.
    Degraded,
    Down,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ProbeOutcome::Down)
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            ProbeOutcome::Up => "up",
            ProbeOutcome::Degraded => "degraded",
            ProbeOutcome::Down => "down",
        }
    }
}

/// Checks whether one service instance is alive.
///
/// Implementations may block for as long as they like; the monitor enforces
/// the configured timeout and drops the future when it expires.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &ServiceRecord) -> ProbeOutcome;
}

/// Considers a service up when a TCP connection to `endpoint:port` succeeds.
#[derive(Debug, Default, Clone)]
pub struct TcpProber;

impl TcpProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, target: &ServiceRecord) -> ProbeOutcome {
        match TcpStream::connect((target.endpoint.as_str(), target.port)).await {
            Ok(_) => ProbeOutcome::Up,
            Err(e) => {
                tracing::debug!(
                    service_id = %target.service_id,
                    addr = %target.address(),
                    error = %e,
                    "Probe connection failed"
                );
                ProbeOutcome::Down
            }
        }
    }
}
