//! Timeout enforcement.
//!
//! Every call into an external capability (probes today) goes through
//! [`with_deadline`] so a hung collaborator surfaces as
//! [`MeshError::Timeout`] instead of stalling the caller.

use std::future::Future;
use std::time::Duration;

use crate::error::{MeshError, MeshResult};

/// Run `fut` with a deadline.
pub async fn with_deadline<F, T>(deadline: Duration, fut: F) -> MeshResult<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| MeshError::Timeout(deadline))
}
