//! Identifiers for knowledge entries.

use serde::{Deserialize, Serialize};
use ulid::Ulid;
use uuid::Uuid;

/// Unique identifier for a KnowledgeEntry.
///
/// Stored as a plain string so ids minted by other writers of the same
/// collection round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnowledgeEntryId(String);

impl KnowledgeEntryId {
    /// Generate a fresh, random id.
    pub fn new() -> Self {
        Self(format!("kb_{}", Ulid::new()))
    }

    /// Derive a stable id from a pattern type and a description prefix.
    ///
    /// Identical inputs always map to the same id, so repeated write-backs
    /// for the same incident overwrite each other instead of piling up.
    pub fn derived(pattern_type: &str, description_prefix: &str) -> Self {
        let key = format!(
            "{}\u{1f}{}",
            pattern_type.trim().to_lowercase(),
            description_prefix.trim().to_lowercase()
        );
        let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes());
        Self(format!("ai_{}", uuid.simple()))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for KnowledgeEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for KnowledgeEntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for KnowledgeEntryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for KnowledgeEntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
