//! Classification result model.

use serde::{Deserialize, Serialize};
use crate::entry::Severity;
use crate::Time;

/// Suggestion used whenever no usable suggestion is available.
pub const MANUAL_REVIEW_SUGGESTION: &str =
    "Review the incident manually and escalate to the on-call engineer if needed.";

/// Reasoning substituted when the model returned none.
pub const MISSING_REASONING: &str = "No reasoning provided by the classifier.";

/// Reasoning used when model output could not be parsed.
pub const PARSE_FAILURE_REASONING: &str =
    "Failed to parse classifier response; manual review required.";

/// Where a classification came from.
///
/// Every result is created with its final source; there are no transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClassificationSource {
    /// Reused from a similar knowledge entry
    Cache,
    /// Produced by the language model
    Model,
    /// Degraded result after an internal failure
    Fallback,
}

impl std::fmt::Display for ClassificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassificationSource::Cache => write!(f, "CACHE"),
            ClassificationSource::Model => write!(f, "MODEL"),
            ClassificationSource::Fallback => write!(f, "FALLBACK"),
        }
    }
}

/// Outcome of classifying an incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Assigned severity
    pub severity: Severity,

    /// Confidence (0.0 - 1.0)
    pub confidence: f32,

    /// Why this severity was chosen
    pub reasoning: String,

    /// Suggested remediation
    pub suggestion: String,

    /// Whether classification completed normally
    pub processed: bool,

    /// When the result was produced
    pub timestamp: Time,

    /// Where the result came from
    pub source: ClassificationSource,
}

impl ClassificationResult {
    /// Create a processed result stamped with the current time.
    pub fn new(
        severity: Severity,
        confidence: f32,
        reasoning: impl Into<String>,
        suggestion: impl Into<String>,
        source: ClassificationSource,
    ) -> Self {
        Self {
            severity,
            confidence,
            reasoning: reasoning.into(),
            suggestion: suggestion.into(),
            processed: true,
            timestamp: chrono::Utc::now(),
            source,
        }
    }

    /// Degraded result returned when classification failed.
    pub fn fallback(cause: impl std::fmt::Display) -> Self {
        Self {
            severity: Severity::Unknown,
            confidence: 0.0,
            reasoning: format!("AI classification unavailable: {}", cause),
            suggestion: MANUAL_REVIEW_SUGGESTION.to_string(),
            processed: false,
            timestamp: chrono::Utc::now(),
            source: ClassificationSource::Fallback,
        }
    }
}
