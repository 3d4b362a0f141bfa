//! Triage core data models.
//!
//! This crate defines the knowledge entries, incidents and classification
//! results shared by the storage, knowledge and AI crates.

#![warn(missing_docs)]

mod id;
mod entry;
mod classification;
mod incident;
pub mod config;

pub use id::KnowledgeEntryId;
pub use entry::{clamp_unit, ConfidenceLevel, KnowledgeEntry, Severity, SimilarityMatch};
pub use classification::{
    ClassificationResult, ClassificationSource, MANUAL_REVIEW_SUGGESTION, MISSING_REASONING,
    PARSE_FAILURE_REASONING,
};
pub use incident::IncidentDescriptor;
pub use config::{
    ClassifierConfig, ConfigError, EmbeddingConfig, EmbeddingModel, OrchestratorConfig,
    SimilarityConfig, StoreBackend, StoreConfig, TriageConfig,
};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
