//! Knowledge entry <-> stored document codec.
//!
//! The document text is `Symptoms: {symptoms} Root Cause: {root_cause}
//! Solution: {solution}`; everything else travels as scalar metadata.
//! Decoding is lenient: a missing section or metadata key yields a partially
//! populated entry instead of an error.

use serde_json::Value;
use std::collections::BTreeSet;
use triage_core::{KnowledgeEntry, KnowledgeEntryId, Severity};
use triage_storage::{Metadata, StoredDocument};

const SYMPTOMS_PREFIX: &str = "Symptoms: ";
const ROOT_CAUSE_SEPARATOR: &str = " Root Cause: ";
const SOLUTION_SEPARATOR: &str = " Solution: ";

/// The three free-text sections of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSections {
    /// Observed symptoms
    pub symptoms: String,
    /// Diagnosed root cause
    pub root_cause: String,
    /// Resolution steps
    pub solution: String,
}

/// Encode the free-text sections of an entry.
pub fn encode(entry: &KnowledgeEntry) -> String {
    format!(
        "{}{}{}{}{}{}",
        SYMPTOMS_PREFIX,
        entry.symptoms,
        ROOT_CAUSE_SEPARATOR,
        entry.root_cause,
        SOLUTION_SEPARATOR,
        entry.solution
    )
}

/// Split a document on the first occurrence of each separator.
pub fn decode(document: &str) -> DocumentSections {
    let body = document.strip_prefix(SYMPTOMS_PREFIX).unwrap_or(document);

    match body.split_once(ROOT_CAUSE_SEPARATOR) {
        Some((symptoms, rest)) => {
            let (root_cause, solution) = rest.split_once(SOLUTION_SEPARATOR).unwrap_or((rest, ""));
            DocumentSections {
                symptoms: symptoms.to_string(),
                root_cause: root_cause.to_string(),
                solution: solution.to_string(),
            }
        }
        None => {
            let (symptoms, solution) = body.split_once(SOLUTION_SEPARATOR).unwrap_or((body, ""));
            DocumentSections {
                symptoms: symptoms.to_string(),
                root_cause: String::new(),
                solution: solution.to_string(),
            }
        }
    }
}

/// Metadata carried next to the document.
pub fn to_metadata(entry: &KnowledgeEntry) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("title".into(), Value::from(entry.title.clone()));
    metadata.insert("pattern_type".into(), Value::from(entry.pattern_type.clone()));
    metadata.insert("severity".into(), Value::from(entry.severity.as_str()));
    metadata.insert("confidence_score".into(), Value::from(entry.confidence_score as f64));
    metadata.insert("usage_count".into(), Value::from(entry.usage_count));
    metadata.insert("success_rate".into(), Value::from(entry.success_rate as f64));
    metadata.insert(
        "resolution_time_minutes".into(),
        Value::from(entry.resolution_time_minutes),
    );
    metadata.insert("environments".into(), list_value(entry.environments.iter()));
    metadata.insert("technologies".into(), list_value(entry.technologies.iter()));
    metadata.insert("tags".into(), list_value(entry.tags.iter()));
    metadata.insert("prerequisites".into(), list_value(entry.prerequisites.iter()));
    metadata.insert(
        "verification_steps".into(),
        list_value(entry.verification_steps.iter()),
    );
    metadata
}

/// Rebuild an entry from a stored document.
pub fn from_document(stored: &StoredDocument) -> KnowledgeEntry {
    let sections = decode(&stored.document);
    let metadata = &stored.metadata;

    let mut entry = KnowledgeEntry::new(
        string_field(metadata, "title"),
        string_field(metadata, "pattern_type"),
        Severity::from_label(&string_field(metadata, "severity")),
        sections.symptoms,
        sections.root_cause,
        sections.solution,
    )
    .with_id(KnowledgeEntryId::from(stored.id.clone()));

    entry.confidence_score = float_field(metadata, "confidence_score").unwrap_or(entry.confidence_score);
    entry.success_rate = float_field(metadata, "success_rate").unwrap_or(0.0);
    entry.usage_count = uint_field(metadata, "usage_count");
    entry.resolution_time_minutes = uint_field(metadata, "resolution_time_minutes");
    entry.environments = list_field(metadata, "environments").into_iter().collect();
    entry.technologies = list_field(metadata, "technologies").into_iter().collect();
    entry.tags = list_field(metadata, "tags").into_iter().collect::<BTreeSet<_>>();
    entry.prerequisites = list_field(metadata, "prerequisites");
    entry.verification_steps = list_field(metadata, "verification_steps");
    entry.normalized()
}

// Stores only accept scalar metadata, so lists travel as JSON array strings.
fn list_value<'a>(items: impl Iterator<Item = &'a String>) -> Value {
    let items: Vec<&String> = items.collect();
    Value::from(serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string()))
}

fn string_field(metadata: &Metadata, key: &str) -> String {
    match metadata.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn float_field(metadata: &Metadata, key: &str) -> Option<f32> {
    match metadata.get(key)? {
        Value::Number(n) => n.as_f64().map(|v| v as f32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn uint_field(metadata: &Metadata, key: &str) -> u32 {
    match metadata.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
            .map(|v| v.min(u32::MAX as u64) as u32)
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn list_field(metadata: &Metadata, key: &str) -> Vec<String> {
    match metadata.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => serde_json::from_str::<Vec<String>>(s).unwrap_or_else(|_| {
            s.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        }),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> KnowledgeEntry {
        KnowledgeEntry::new(
            "Connection pool exhausted",
            "DATABASE_CONNECTION_ERROR",
            Severity::High,
            "Database connection timeout under load",
            "Connection pool too small for traffic",
            "Increase pool size and restart the service",
        )
        .with_confidence(0.95)
        .with_success_rate(0.9)
        .with_resolution_time(30)
        .with_tags(["database", "pool, sizing"])
        .with_technologies(["postgresql"])
        .with_verification_steps(vec!["Check pool metrics".into(), "Run smoke test".into()])
    }

    #[test]
    fn test_encode_format() {
        let entry = KnowledgeEntry::new("t", "P", Severity::Low, "a", "b", "c");
        assert_eq!(encode(&entry), "Symptoms: a Root Cause: b Solution: c");
    }

    #[test]
    fn test_decode_reverses_encode() {
        let entry = sample_entry();
        let sections = decode(&encode(&entry));
        assert_eq!(sections.symptoms, entry.symptoms);
        assert_eq!(sections.root_cause, entry.root_cause);
        assert_eq!(sections.solution, entry.solution);
    }

    #[test]
    fn test_decode_sections_with_punctuation_and_newlines() {
        let texts = [
            ("disk: 100% used", "logrotate: disabled\nsince deploy", "Solution-ish: rotate"),
            ("  padded  ", "cause", "fix: now"),
        ];
        for (symptoms, root_cause, solution) in texts {
            let entry = KnowledgeEntry::new("t", "P", Severity::Low, symptoms, root_cause, solution);
            let sections = decode(&encode(&entry));
            assert_eq!(sections.symptoms, symptoms);
            assert_eq!(sections.root_cause, root_cause);
            assert_eq!(sections.solution, solution);
        }
    }

    #[test]
    fn test_decode_missing_sections_is_lenient() {
        let sections = decode("Symptoms: only symptoms here");
        assert_eq!(sections.symptoms, "only symptoms here");
        assert!(sections.root_cause.is_empty());
        assert!(sections.solution.is_empty());

        let sections = decode("Symptoms: s Solution: fix it");
        assert_eq!(sections.symptoms, "s");
        assert!(sections.root_cause.is_empty());
        assert_eq!(sections.solution, "fix it");

        let sections = decode("free text without labels");
        assert_eq!(sections.symptoms, "free text without labels");
    }

    #[test]
    fn test_decode_splits_on_first_separator() {
        let sections = decode("Symptoms: a Root Cause: b Solution: c Solution: d");
        assert_eq!(sections.root_cause, "b");
        assert_eq!(sections.solution, "c Solution: d");
    }

    #[test]
    fn test_metadata_round_trip() {
        let entry = sample_entry();
        let stored = StoredDocument {
            id: entry.id.to_string(),
            document: encode(&entry),
            metadata: to_metadata(&entry),
        };

        let decoded = from_document(&stored);
        assert_eq!(decoded.id, entry.id);
        assert_eq!(decoded.title, entry.title);
        assert_eq!(decoded.pattern_type, entry.pattern_type);
        assert_eq!(decoded.severity, Severity::High);
        assert!((decoded.confidence_score - 0.95).abs() < 1e-6);
        assert_eq!(decoded.resolution_time_minutes, 30);
        assert_eq!(decoded.tags, entry.tags);
        assert_eq!(decoded.technologies, entry.technologies);
        assert_eq!(decoded.verification_steps, entry.verification_steps);
    }

    #[test]
    fn test_from_document_with_sparse_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert("confidence_score".into(), Value::from("1.7"));
        metadata.insert("tags".into(), Value::from("alpha, beta"));
        let stored = StoredDocument {
            id: "legacy-1".into(),
            document: "Symptoms: x".into(),
            metadata,
        };

        let entry = from_document(&stored);
        assert_eq!(entry.id.as_str(), "legacy-1");
        assert_eq!(entry.severity, Severity::Unknown);
        assert_eq!(entry.confidence_score, 1.0);
        assert!(entry.tags.contains("beta"));
        assert!(entry.title.is_empty());
    }
}
