//! Configuration for the triage pipeline.
//!
//! Every tunable number used by the search engine and the orchestrator lives
//! here, with serde defaults so partial JSON files are accepted.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid JSON
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Vector store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Embedding provider settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Similarity search settings
    #[serde(default)]
    pub similarity: SimilarityConfig,

    /// Language model settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Orchestration settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl TriageConfig {
    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store, lost on exit
    #[default]
    Memory,
    /// Chroma-compatible REST server
    Chroma,
}

/// Vector store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend to use
    #[serde(default)]
    pub backend: StoreBackend,

    /// Server URL (remote backends only)
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Collection holding knowledge entries
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Request timeout in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_store_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_collection() -> String {
    "incident_knowledge".to_string()
}

fn default_store_timeout() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_store_url(),
            collection: default_collection(),
            timeout_secs: default_store_timeout(),
        }
    }
}

/// Embedding model type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingModel {
    /// Qwen3 Embedding (Ollama local)
    Qwen3Embedding0_6B,
    /// Nomic text embedding (Ollama local)
    NomicEmbedText,
    /// Custom model via Ollama
    Ollama {
        /// Ollama model tag
        name: String,
    },
}

impl EmbeddingModel {
    /// Model name as understood by Ollama.
    pub fn model_name(&self) -> String {
        match self {
            EmbeddingModel::Qwen3Embedding0_6B => "qwen3-embedding:0.6b".to_string(),
            EmbeddingModel::NomicEmbedText => "nomic-embed-text".to_string(),
            EmbeddingModel::Ollama { name } => name.clone(),
        }
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Enable embeddings; when off every search uses keyword fallback
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Embedding model to use
    #[serde(default = "default_embedding_model")]
    pub model: EmbeddingModel,

    /// Ollama server URL
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Embedding dimension
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_embedding_model() -> EmbeddingModel {
    EmbeddingModel::Qwen3Embedding0_6B
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_dimension() -> usize {
    1024 // Qwen3-Embedding-0.6B dimension
}

fn default_embedding_timeout() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_embedding_model(),
            ollama_url: default_ollama_url(),
            dimension: default_dimension(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// Similarity search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Minimum similarity for a match (0.0 - 1.0)
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Keyword fallback bonus when the whole query appears in the entry
    #[serde(default = "default_phrase_bonus")]
    pub phrase_bonus: f32,

    /// Keyword fallback bonus when the entry's pattern type appears in the query
    #[serde(default = "default_pattern_type_bonus")]
    pub pattern_type_bonus: f32,

    /// Shortest query token counted by the keyword fallback
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,

    /// Ask the store to embed query text itself when no provider is available
    #[serde(default)]
    pub store_side_embedding: bool,

    /// Strip leading and trailing punctuation from keyword tokens
    #[serde(default)]
    pub trim_token_punctuation: bool,
}

fn default_threshold() -> f32 {
    0.6
}

fn default_phrase_bonus() -> f32 {
    0.3
}

fn default_pattern_type_bonus() -> f32 {
    0.2
}

fn default_min_token_len() -> usize {
    3
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            phrase_bonus: default_phrase_bonus(),
            pattern_type_bonus: default_pattern_type_bonus(),
            min_token_len: default_min_token_len(),
            store_side_embedding: false,
            trim_token_punctuation: false,
        }
    }
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Ollama server URL
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Generation model name
    #[serde(default = "default_classifier_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
}

fn default_classifier_model() -> String {
    "qwen3:4b".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_classifier_timeout() -> u64 {
    120
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            model: default_classifier_model(),
            temperature: default_temperature(),
            timeout_secs: default_classifier_timeout(),
        }
    }
}

/// Orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Matches fetched from the knowledge base per incident
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,

    /// Entry confidence above which a match is reused regardless of type
    #[serde(default = "default_good_match_confidence")]
    pub good_match_confidence: f32,

    /// Persist confident model results as new entries
    #[serde(default = "default_true")]
    pub write_back_enabled: bool,

    /// Model confidence above which a result is written back
    #[serde(default = "default_write_back_min_confidence")]
    pub write_back_min_confidence: f32,

    /// Success rate assigned to written-back entries
    #[serde(default = "default_write_back_success_rate")]
    pub write_back_success_rate: f32,

    /// Description characters used in written-back titles
    #[serde(default = "default_title_prefix_chars")]
    pub title_prefix_chars: usize,
}

fn default_max_matches() -> usize {
    3
}

fn default_good_match_confidence() -> f32 {
    0.8
}

fn default_write_back_min_confidence() -> f32 {
    0.7
}

fn default_write_back_success_rate() -> f32 {
    0.8
}

fn default_title_prefix_chars() -> usize {
    50
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_matches: default_max_matches(),
            good_match_confidence: default_good_match_confidence(),
            write_back_enabled: true,
            write_back_min_confidence: default_write_back_min_confidence(),
            write_back_success_rate: default_write_back_success_rate(),
            title_prefix_chars: default_title_prefix_chars(),
        }
    }
}
