//! Knowledge entry model - solved incidents reusable as cached resolutions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use crate::id::KnowledgeEntryId;

/// Severity level of an incident or a stored resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Minor impact, no urgency
    Low,
    /// Degraded service
    Medium,
    /// Outage or data at risk
    High,
    /// Not determined
    #[default]
    Unknown,
}

impl Severity {
    /// Upper-case label used in documents, metadata and prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Unknown => "UNKNOWN",
        }
    }

    /// Parse an exact label, ignoring case and surrounding whitespace.
    ///
    /// Anything outside LOW/MEDIUM/HIGH maps to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "LOW" => Severity::Low,
            "MEDIUM" => Severity::Medium,
            "HIGH" => Severity::High,
            _ => Severity::Unknown,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp a score into `[0, 1]`. NaN maps to `0`.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A stored symptom -> solution record.
///
/// Entries are never mutated once stored; an update is a delete by id
/// followed by a fresh add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Unique identifier
    pub id: KnowledgeEntryId,

    /// Short human-readable title
    pub title: String,

    /// Category tag, e.g. `DATABASE_CONNECTION_ERROR`
    pub pattern_type: String,

    /// Severity of incidents matching this entry
    #[serde(default)]
    pub severity: Severity,

    /// Observed symptoms
    pub symptoms: String,

    /// Diagnosed root cause
    pub root_cause: String,

    /// Resolution steps
    pub solution: String,

    /// Confidence in this entry (0.0 - 1.0)
    #[serde(default = "default_confidence")]
    pub confidence_score: f32,

    /// Times this entry was reused
    #[serde(default)]
    pub usage_count: u32,

    /// Fraction of successful reuses (0.0 - 1.0)
    #[serde(default)]
    pub success_rate: f32,

    /// Typical time to resolve
    #[serde(default)]
    pub resolution_time_minutes: u32,

    /// Environments where this was seen
    #[serde(default)]
    pub environments: BTreeSet<String>,

    /// Technologies involved
    #[serde(default)]
    pub technologies: BTreeSet<String>,

    /// Free-form tags
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Ordered prerequisites before applying the solution
    #[serde(default)]
    pub prerequisites: Vec<String>,

    /// Ordered steps verifying the fix
    #[serde(default)]
    pub verification_steps: Vec<String>,
}

fn default_confidence() -> f32 {
    0.5
}

impl KnowledgeEntry {
    /// Create a new entry with a fresh id and neutral statistics.
    pub fn new(
        title: impl Into<String>,
        pattern_type: impl Into<String>,
        severity: Severity,
        symptoms: impl Into<String>,
        root_cause: impl Into<String>,
        solution: impl Into<String>,
    ) -> Self {
        Self {
            id: KnowledgeEntryId::new(),
            title: title.into(),
            pattern_type: pattern_type.into(),
            severity,
            symptoms: symptoms.into(),
            root_cause: root_cause.into(),
            solution: solution.into(),
            confidence_score: default_confidence(),
            usage_count: 0,
            success_rate: 0.0,
            resolution_time_minutes: 0,
            environments: BTreeSet::new(),
            technologies: BTreeSet::new(),
            tags: BTreeSet::new(),
            prerequisites: Vec::new(),
            verification_steps: Vec::new(),
        }
    }

    /// Replace the id.
    pub fn with_id(mut self, id: KnowledgeEntryId) -> Self {
        self.id = id;
        self
    }

    /// Set the confidence score, clamped into `[0, 1]`.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence_score = clamp_unit(confidence);
        self
    }

    /// Set the success rate, clamped into `[0, 1]`.
    pub fn with_success_rate(mut self, rate: f32) -> Self {
        self.success_rate = clamp_unit(rate);
        self
    }

    /// Set the typical resolution time.
    pub fn with_resolution_time(mut self, minutes: u32) -> Self {
        self.resolution_time_minutes = minutes;
        self
    }

    /// Add tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Add technologies.
    pub fn with_technologies<I, S>(mut self, technologies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.technologies.extend(technologies.into_iter().map(Into::into));
        self
    }

    /// Add environments.
    pub fn with_environments<I, S>(mut self, environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environments.extend(environments.into_iter().map(Into::into));
        self
    }

    /// Set the verification steps.
    pub fn with_verification_steps(mut self, steps: Vec<String>) -> Self {
        self.verification_steps = steps;
        self
    }

    /// Set the prerequisites.
    pub fn with_prerequisites(mut self, prerequisites: Vec<String>) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    /// Return a copy with scores forced back into `[0, 1]`.
    pub fn normalized(mut self) -> Self {
        self.confidence_score = clamp_unit(self.confidence_score);
        self.success_rate = clamp_unit(self.success_rate);
        self
    }

    /// Text used for keyword matching.
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.title, self.pattern_type, self.symptoms, self.root_cause, self.solution
        )
    }
}

/// Qualitative bucket for a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    /// Above 0.8
    High,
    /// Between 0.6 and 0.8 inclusive
    Medium,
    /// Below 0.6
    Low,
}

impl ConfidenceLevel {
    /// Bucket a similarity score.
    pub fn from_score(score: f32) -> Self {
        if score > 0.8 {
            ConfidenceLevel::High
        } else if score >= 0.6 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// A knowledge entry found by a similarity search.
///
/// The entry is a decoded snapshot of the stored record; holding it does
/// not keep anything in the store alive.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityMatch {
    /// The matched entry
    pub entry: KnowledgeEntry,

    /// Similarity score (0.0 - 1.0, higher is more similar)
    pub similarity_score: f32,

    /// Raw store distance, when the match came from a vector query
    pub distance: Option<f32>,

    /// 1-based rank within the result list
    pub rank: usize,

    /// Why this entry matched
    pub relevance_reason: Option<String>,
}

impl SimilarityMatch {
    /// Qualitative confidence derived from the similarity score.
    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.similarity_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_label() {
        assert_eq!(Severity::from_label("high"), Severity::High);
        assert_eq!(Severity::from_label(" Medium "), Severity::Medium);
        assert_eq!(Severity::from_label("LOW"), Severity::Low);
        assert_eq!(Severity::from_label("CRITICAL"), Severity::Unknown);
        assert_eq!(Severity::from_label(""), Severity::Unknown);
    }

    #[test]
    fn test_severity_serializes_upper_case() {
        let json = serde_json::to_string(&Severity::High).unwrap();
        assert_eq!(json, "\"HIGH\"");
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(f32::NAN), 0.0);
        assert_eq!(clamp_unit(0.42), 0.42);
    }

    #[test]
    fn test_builder_clamps_scores() {
        let entry = KnowledgeEntry::new("t", "P", Severity::Low, "s", "r", "f")
            .with_confidence(3.0)
            .with_success_rate(-1.0);
        assert_eq!(entry.confidence_score, 1.0);
        assert_eq!(entry.success_rate, 0.0);
    }

    #[test]
    fn test_confidence_level_boundaries() {
        assert_eq!(ConfidenceLevel::from_score(0.81), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.8), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.6), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.59), ConfidenceLevel::Low);
    }

    #[test]
    fn test_match_confidence_level_follows_score() {
        let mut found = SimilarityMatch {
            entry: KnowledgeEntry::new("t", "P", Severity::Low, "s", "r", "f"),
            similarity_score: 0.92,
            distance: Some(0.08),
            rank: 1,
            relevance_reason: None,
        };
        assert_eq!(found.confidence_level(), ConfidenceLevel::High);

        found.similarity_score = 0.7;
        assert_eq!(found.confidence_level(), ConfidenceLevel::Medium);

        found.similarity_score = 0.3;
        assert_eq!(found.confidence_level(), ConfidenceLevel::Low);
    }

    #[test]
    fn test_entry_deserializes_with_defaults() {
        let json = r#"{
            "id": "kb_1",
            "title": "Disk full",
            "pattern_type": "DISK_FULL",
            "symptoms": "writes fail",
            "root_cause": "logs",
            "solution": "rotate logs"
        }"#;
        let entry: KnowledgeEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.severity, Severity::Unknown);
        assert_eq!(entry.confidence_score, 0.5);
        assert!(entry.tags.is_empty());
    }
}
