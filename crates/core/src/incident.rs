//! Incident descriptor supplied by callers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::Time;

/// An incident to classify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentDescriptor {
    /// Caller-side identifier
    pub external_id: String,

    /// Incident type, e.g. `DATABASE_CONNECTION_ERROR`
    #[serde(rename = "type")]
    pub incident_type: String,

    /// Free-text description
    pub description: String,

    /// Reporting system
    #[serde(default)]
    pub source: String,

    /// When the incident was reported
    #[serde(default = "chrono::Utc::now")]
    pub timestamp: Time,

    /// Additional attributes
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl IncidentDescriptor {
    /// Create a descriptor stamped with the current time.
    pub fn new(
        external_id: impl Into<String>,
        incident_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            incident_type: incident_type.into(),
            description: description.into(),
            source: String::new(),
            timestamp: chrono::Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Set the reporting source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Add a metadata attribute.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Knowledge base query text: description followed by type.
    pub fn query_text(&self) -> String {
        format!("{} {}", self.description, self.incident_type)
    }
}
