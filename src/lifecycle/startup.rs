//! Startup orchestration.

use std::sync::Arc;

use crate::config::{MeshConfig, ServiceSeed};
use crate::coordinator::MeshCoordinator;
use crate::error::MeshResult;
use crate::health::Prober;
use crate::registry::{metadata_from_json, ServiceRecord};

/// Build a coordinator, register and monitor every seeded service, and start it.
pub fn bootstrap(config: &MeshConfig, prober: Arc<dyn Prober>) -> MeshResult<MeshCoordinator> {
    let coordinator = MeshCoordinator::with_prober(config.clone(), prober)?;

    for seed in &config.services {
        coordinator.register_service(seed_record(seed)?)?;
        coordinator.start_health_monitoring(&seed.id, None)?;
    }

    coordinator.start()?;
    tracing::info!(
        node_id = %coordinator.node_id(),
        seeded = config.services.len(),
        "Bootstrap complete"
    );
    Ok(coordinator)
}

/// Turn a config seed into a registrable record.
pub fn seed_record(seed: &ServiceSeed) -> MeshResult<ServiceRecord> {
    let mut record = ServiceRecord::new(&seed.name, &seed.id, &seed.endpoint, seed.port).with_weight(seed.weight);
    if let Some(metadata) = &seed.metadata {
        record = record.with_metadata(metadata_from_json(metadata)?);
    }
    Ok(record)
}
