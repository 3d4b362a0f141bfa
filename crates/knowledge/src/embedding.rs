//! Embedding providers.
//!
//! The similarity engine only needs text -> vector and a cheap availability
//! check. [`OllamaEmbeddingClient`] talks to a local Ollama server;
//! [`DisabledEmbeddings`] reports itself unavailable so every search takes
//! the keyword path.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use triage_core::EmbeddingConfig;

/// Errors raised by embedding providers.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// Endpoint unreachable or returned an error status
    #[error("Embedding service unavailable: {0}")]
    Unavailable(String),

    /// Response did not contain a usable vector
    #[error("Malformed embedding response: {0}")]
    Malformed(String),
}

/// Text -> fixed-length vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for text.
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Check whether the provider can currently serve requests. Never fails.
    async fn is_available(&self) -> bool;

    /// Embed several texts, one request at a time, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.generate_embedding(text).await?);
        }
        Ok(results)
    }
}

/// Ollama Embedding Client.
#[derive(Clone)]
pub struct OllamaEmbeddingClient {
    /// HTTP client
    client: Client,

    /// Ollama server URL
    url: String,

    /// Model name
    model: String,

    /// Expected vector length, if known
    dimension: Option<usize>,
}

impl OllamaEmbeddingClient {
    /// Create a new Ollama embedding client.
    pub fn new(url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: ClientBuilder::new()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            url: url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimension: None,
        }
    }

    /// Build a client from configuration.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(
            config.ollama_url.clone(),
            config.model.model_name(),
            Duration::from_secs(config.timeout_secs),
        )
        .with_dimension(config.dimension)
    }

    /// Reject vectors whose length differs from `dimension`.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingClient {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let payload = json!({
            "model": self.model,
            "prompt": text,
        });

        debug!("Generating embedding for text ({} chars)", text.len());

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Unavailable(format!(
                "Ollama API error (status {}): {}",
                status, error_text
            )));
        }

        #[derive(serde::Deserialize)]
        struct Response {
            embedding: Vec<f32>,
        }

        let response_data: Response = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;

        check_embedding(response_data.embedding, self.dimension)
    }

    async fn is_available(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/version", self.url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Embedding health check failed: {}", e);
                false
            }
        }
    }
}

fn check_embedding(embedding: Vec<f32>, dimension: Option<usize>) -> Result<Vec<f32>, EmbeddingError> {
    if embedding.is_empty() {
        return Err(EmbeddingError::Malformed("empty embedding".to_string()));
    }
    if let Some(expected) = dimension {
        if embedding.len() != expected {
            return Err(EmbeddingError::Malformed(format!(
                "expected {} dimensions, got {}",
                expected,
                embedding.len()
            )));
        }
    }
    if embedding.iter().any(|x| !x.is_finite()) {
        return Err(EmbeddingError::Malformed("non-finite component".to_string()));
    }
    Ok(embedding)
}

/// Provider used when embeddings are switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEmbeddings;

#[async_trait]
impl EmbeddingProvider for DisabledEmbeddings {
    async fn generate_embedding(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Unavailable("embeddings are disabled".to_string()))
    }

    async fn is_available(&self) -> bool {
        false
    }
}
