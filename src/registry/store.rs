//! Service record storage.
//!
//! # Responsibilities
//! - Own the canonical map of service id → record
//! - Keep per-name membership in registration order
//! - Make registration and unregistration atomic
//!
//! # Locking
//! Two maps, always locked in the same order: `names` entry first, then the
//! `records` entry. Nothing else in the crate holds a store guard while
//! calling out.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;

use crate::error::{require_id, MeshError, MeshResult};
use crate::registry::query::ServiceQuery;
use crate::registry::record::{ServiceRecord, ServiceStatus};

/// Concurrent service registry.
#[derive(Debug, Default)]
pub struct ServiceStore {
    /// service_id → record.
    records: DashMap<String, ServiceRecord>,
    /// service_name → ids in registration order.
    names: DashMap<String, Vec<String>>,
}

impl ServiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record. Fails if the id is taken under any name.
    pub fn register(&self, record: ServiceRecord) -> MeshResult<()> {
        record.validate()?;
        let name = record.service_name.clone();
        let id = record.service_id.clone();

        let inserted = {
            let mut ids = self.names.entry(name.clone()).or_default();
            match self.records.entry(id.clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(record);
                    ids.push(id.clone());
                    true
                }
            }
        };

        if !inserted {
            self.names.remove_if(&name, |_, ids| ids.is_empty());
            return Err(MeshError::AlreadyExists(id));
        }
        Ok(())
    }

    /// Remove a record and return it.
    pub fn unregister(&self, service_id: &str) -> MeshResult<ServiceRecord> {
        require_id(service_id, "service_id")?;
        let name = self
            .records
            .get(service_id)
            .map(|r| r.service_name.clone())
            .ok_or_else(|| MeshError::NotFound(service_id.to_string()))?;

        let removed = {
            let mut ids = self
                .names
                .get_mut(&name)
                .ok_or_else(|| MeshError::NotFound(service_id.to_string()))?;
            let removed = self.records.remove(service_id).map(|(_, record)| record);
            ids.retain(|id| id != service_id);
            removed
        };
        self.names.remove_if(&name, |_, ids| ids.is_empty());

        removed.ok_or_else(|| MeshError::NotFound(service_id.to_string()))
    }

    pub fn get(&self, service_id: &str) -> MeshResult<ServiceRecord> {
        require_id(service_id, "service_id")?;
        self.records
            .get(service_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| MeshError::NotFound(service_id.to_string()))
    }

    pub fn contains(&self, service_id: &str) -> bool {
        self.records.contains_key(service_id)
    }

    /// Records registered under `service_name`, in registration order.
    pub fn list_by_name(&self, service_name: &str) -> MeshResult<Vec<ServiceRecord>> {
        require_id(service_name, "service_name")?;
        let Some(ids) = self.names.get(service_name) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| r.value().clone()))
            .collect())
    }

    /// Records matching `query`, in `list_all` order.
    pub fn find(&self, query: &ServiceQuery) -> Vec<ServiceRecord> {
        self.list_all().into_iter().filter(|r| query.matches(r)).collect()
    }

    /// Every record, grouped by name and in registration order within a name.
    pub fn list_all(&self) -> Vec<ServiceRecord> {
        let mut names: Vec<String> = self.names.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
            .iter()
            .filter_map(|name| self.list_by_name(name).ok())
            .flatten()
            .collect()
    }

    pub fn update_metadata(&self, service_id: &str, metadata: serde_json::Value) -> MeshResult<()> {
        require_id(service_id, "service_id")?;
        let mut record = self
            .records
            .get_mut(service_id)
            .ok_or_else(|| MeshError::NotFound(service_id.to_string()))?;
        record.metadata = metadata;
        Ok(())
    }

    /// Set the status and return the previous one.
    pub fn update_status(&self, service_id: &str, status: ServiceStatus) -> MeshResult<ServiceStatus> {
        let mut record = self
            .records
            .get_mut(service_id)
            .ok_or_else(|| MeshError::NotFound(service_id.to_string()))?;
        Ok(std::mem::replace(&mut record.status, status))
    }

    pub fn update_response_time(&self, service_id: &str, response_time: Duration) -> MeshResult<()> {
        let mut record = self
            .records
            .get_mut(service_id)
            .ok_or_else(|| MeshError::NotFound(service_id.to_string()))?;
        record.last_response_time = Some(response_time);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
