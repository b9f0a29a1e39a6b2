//! Filtered discovery.
//!
//! Tags live in record metadata as a `"tags"` array of strings; any other
//! metadata shape simply has no tags.

use serde::{Deserialize, Serialize};

use crate::registry::record::ServiceRecord;

/// Criteria a record must meet to be discovered. Every set criterion must
/// hold; an empty query matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceQuery {
    /// Substring of the service name.
    pub name_pattern: Option<String>,
    /// Tags the record must all carry.
    pub tags: Vec<String>,
    /// Only Healthy and Degraded records.
    pub selectable_only: bool,
}

impl ServiceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name_contains(mut self, pattern: impl Into<String>) -> Self {
        self.name_pattern = Some(pattern.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn selectable_only(mut self) -> Self {
        self.selectable_only = true;
        self
    }

    pub fn matches(&self, record: &ServiceRecord) -> bool {
        if let Some(pattern) = &self.name_pattern {
            if !record.service_name.contains(pattern.as_str()) {
                return false;
            }
        }
        if self.selectable_only && !record.status.is_selectable() {
            return false;
        }
        self.tags.iter().all(|tag| has_tag(record, tag))
    }
}

fn has_tag(record: &ServiceRecord, tag: &str) -> bool {
    record
        .metadata
        .get("tags")
        .and_then(|tags| tags.as_array())
        .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(tag)))
}
