//! Language model boundary: fielded prompt in, one completion out.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde_json::json;
use std::fmt::Write;
use std::time::Duration;
use tracing::debug;
use triage_core::{ClassifierConfig, IncidentDescriptor};

/// Errors raised by language model calls.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// Endpoint unreachable or timed out
    #[error("classifier unavailable: {0}")]
    Unavailable(String),

    /// Non-success response
    #[error("classifier returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Response body could not be read
    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

/// A text completion model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a prompt.
    async fn complete(&self, prompt: &str) -> Result<String, ClassifierError>;
}

/// Build the classification prompt for an incident.
pub fn build_prompt(incident: &IncidentDescriptor) -> String {
    let mut prompt = String::from(
        "You are an incident triage assistant. Classify the severity of the incident below.\n\n",
    );

    let _ = writeln!(prompt, "Incident ID: {}", incident.external_id);
    let _ = writeln!(prompt, "Type: {}", incident.incident_type);
    let _ = writeln!(prompt, "Description: {}", incident.description);
    let _ = writeln!(prompt, "Source: {}", incident.source);
    let _ = writeln!(prompt, "Timestamp: {}", incident.timestamp.to_rfc3339());
    if incident.metadata.is_empty() {
        prompt.push_str("Metadata: none\n");
    } else {
        prompt.push_str("Metadata:\n");
        for (key, value) in &incident.metadata {
            let _ = writeln!(prompt, "  {}: {}", key, value);
        }
    }

    prompt.push_str(
        "\nRespond in exactly this format:\n\
         SEVERITY: <LOW|MEDIUM|HIGH>\n\
         CONFIDENCE: <number between 0.0 and 1.0>\n\
         REASONING: <why this severity>\n\
         SUGGESTION: <recommended remediation>\n",
    );
    prompt
}

/// Ollama generation client.
#[derive(Clone)]
pub struct OllamaLanguageModel {
    /// HTTP client
    client: Client,

    /// Ollama server URL
    url: String,

    /// Model name
    model: String,

    /// Sampling temperature
    temperature: f32,
}

impl OllamaLanguageModel {
    /// Create a new client.
    pub fn new(url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: ClientBuilder::new()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            url: url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 0.1,
        }
    }

    /// Build a client from configuration.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let mut model = Self::new(
            config.ollama_url.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        );
        model.temperature = config.temperature;
        model
    }
}

#[async_trait]
impl LanguageModel for OllamaLanguageModel {
    async fn complete(&self, prompt: &str) -> Result<String, ClassifierError> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature
            }
        });

        debug!("Requesting classification from {} ({} chars)", self.model, prompt.len());

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Status { status, body });
        }

        #[derive(serde::Deserialize)]
        struct Response {
            response: String,
        }

        let response_data: Response = response
            .json()
            .await
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;

        Ok(response_data.response)
    }
}
