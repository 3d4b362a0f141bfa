//! Classifier response parsing.
//!
//! Parsing runs in two stages: [`extract_fields`] scans the raw completion
//! for `SEVERITY:`, `CONFIDENCE:`, `REASONING:` and `SUGGESTION:` labels
//! (case-insensitive) into an [`ExtractedFields`] record of optional values,
//! and [`apply_defaults`] turns that record into a [`ClassificationResult`].

use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};
use triage_core::{
    ClassificationResult, ClassificationSource, Severity, MANUAL_REVIEW_SUGGESTION,
    MISSING_REASONING, PARSE_FAILURE_REASONING,
};

/// Confidence assumed when the response carries no usable number.
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Errors raised while extracting fields.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// Blank completion
    #[error("empty response")]
    EmptyResponse,

    /// None of the expected labels appear in the text
    #[error("no recognizable labels in response")]
    NoRecognizableLabels,

    /// Label patterns failed to compile
    #[error("invalid label pattern: {0}")]
    Pattern(String),
}

/// Fields found in a completion, before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    /// Value after `SEVERITY:`; `Some(Unknown)` if the label had no known level
    pub severity: Option<Severity>,
    /// First number after `CONFIDENCE:`
    pub confidence: Option<f32>,
    /// Text between `REASONING:` and the next `SUGGESTION:`
    pub reasoning: Option<String>,
    /// Text after `SUGGESTION:`
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Severity,
    Confidence,
    Reasoning,
    Suggestion,
}

impl Label {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "severity" => Some(Label::Severity),
            "confidence" => Some(Label::Confidence),
            "reasoning" => Some(Label::Reasoning),
            "suggestion" => Some(Label::Suggestion),
            _ => None,
        }
    }
}

struct LabelMatch {
    label: Label,
    start: usize,
    end: usize,
}

struct Patterns {
    label: Regex,
    word: Regex,
    number: Regex,
    level: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            label: Regex::new(r"(?i)\b(severity|confidence|reasoning|suggestion)\s*:")?,
            word: Regex::new(r"[A-Za-z]+")?,
            number: Regex::new(r"([-+]?(?:\d+(?:\.\d+)?|\.\d+))\s*(%)?")?,
            level: Regex::new(r"(?i)\b(critical|high|medium|low)\b")?,
        })
    }
}

fn patterns() -> Result<&'static Patterns, ParseError> {
    static PATTERNS: OnceLock<Result<Patterns, String>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| Patterns::compile().map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| ParseError::Pattern(e.clone()))
}

fn rest_of_line(text: &str, from: usize) -> &str {
    let rest = &text[from..];
    rest.split('\n').next().unwrap_or(rest)
}

fn clean(text: &str) -> String {
    text.trim_matches(|c: char| c.is_whitespace() || c == '*').to_string()
}

fn find_labels(patterns: &Patterns, text: &str) -> Vec<LabelMatch> {
    patterns
        .label
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = Label::from_name(caps.get(1)?.as_str())?;
            Some(LabelMatch {
                label,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Stage one: pull labelled values out of a completion.
pub fn extract_fields(raw: &str) -> Result<ExtractedFields, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let patterns = patterns()?;
    let labels = find_labels(patterns, raw);
    if labels.is_empty() {
        return Err(ParseError::NoRecognizableLabels);
    }
    let first = |label: Label| labels.iter().find(|m| m.label == label);

    let severity = first(Label::Severity).map(|m| {
        patterns
            .word
            .find(rest_of_line(raw, m.end))
            .map(|w| Severity::from_label(w.as_str()))
            .unwrap_or(Severity::Unknown)
    });

    let confidence = first(Label::Confidence).and_then(|m| {
        let caps = patterns.number.captures(rest_of_line(raw, m.end))?;
        let value: f32 = caps.get(1)?.as_str().parse().ok()?;
        Some(if caps.get(2).is_some() { value / 100.0 } else { value })
    });

    let reasoning = first(Label::Reasoning).map(|m| {
        let end = labels
            .iter()
            .find(|s| s.label == Label::Suggestion && s.start >= m.end)
            .map(|s| s.start)
            .unwrap_or(raw.len());
        clean(&raw[m.end..end])
    });

    let suggestion = first(Label::Suggestion).map(|m| clean(&raw[m.end..]));

    Ok(ExtractedFields {
        severity,
        confidence,
        reasoning,
        suggestion,
    })
}

/// Stage two: fill missing values.
pub fn apply_defaults(fields: ExtractedFields) -> ClassificationResult {
    let reasoning = fields
        .reasoning
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| MISSING_REASONING.to_string());
    let suggestion = fields
        .suggestion
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| MANUAL_REVIEW_SUGGESTION.to_string());

    ClassificationResult::new(
        fields.severity.unwrap_or(Severity::Unknown),
        fields.confidence.unwrap_or(DEFAULT_CONFIDENCE),
        reasoning,
        suggestion,
        ClassificationSource::Model,
    )
}

/// Result used when a completion cannot be parsed at all.
pub fn parse_failure() -> ClassificationResult {
    ClassificationResult::new(
        Severity::Unknown,
        0.0,
        PARSE_FAILURE_REASONING,
        MANUAL_REVIEW_SUGGESTION,
        ClassificationSource::Model,
    )
}

/// Turns raw model completions into classification results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    /// Create a parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a completion. Never fails; unparseable text yields an
    /// `UNKNOWN` result with zero confidence.
    pub fn parse(&self, raw: &str) -> ClassificationResult {
        match extract_fields(raw) {
            Ok(fields) => {
                debug!("Extracted classifier fields: {:?}", fields);
                apply_defaults(fields)
            }
            Err(e) => {
                warn!("Could not parse classifier response: {}", e);
                parse_failure()
            }
        }
    }

    /// Severity from loosely structured text.
    ///
    /// A `SEVERITY:` label wins when it names a level; otherwise the text is
    /// scanned for level words, highest first. `CRITICAL` counts as `HIGH`.
    pub fn parse_severity_from_free_text(&self, text: &str) -> Severity {
        let Ok(patterns) = patterns() else {
            return Severity::Unknown;
        };

        let labelled = find_labels(patterns, text)
            .into_iter()
            .find(|m| m.label == Label::Severity)
            .and_then(|m| patterns.level.find(rest_of_line(text, m.end)))
            .map(|w| level_to_severity(w.as_str()));
        if let Some(severity) = labelled {
            return severity;
        }

        patterns
            .level
            .find_iter(text)
            .map(|w| level_to_severity(w.as_str()))
            .max_by_key(|s| match s {
                Severity::High => 3,
                Severity::Medium => 2,
                Severity::Low => 1,
                Severity::Unknown => 0,
            })
            .unwrap_or(Severity::Unknown)
    }
}

fn level_to_severity(word: &str) -> Severity {
    match word.to_uppercase().as_str() {
        "CRITICAL" | "HIGH" => Severity::High,
        other => Severity::from_label(other),
    }
}
