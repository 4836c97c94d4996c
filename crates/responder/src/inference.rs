//! Inference service client.
//!
//! The specialists and the synthesizer talk to an Ollama-style `generate`
//! endpoint through the [`InferenceClient`] trait so tests can swap in fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::InferenceConfig;
use crate::error::InferenceError;

/// Free-text analysis backend.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Answer a prompt. Failures are never retried by callers.
    async fn generate(&self, prompt: &str) -> Result<String, InferenceError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Client for an Ollama `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client from configuration.
    ///
    /// Timeouts are applied per query by the callers, not here.
    #[must_use]
    pub fn new(config: &InferenceConfig) -> Self {
        Self {
            url: config.url.clone(),
            model: config.model.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, InferenceError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Calling inference service");

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self.client.post(&self.url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status { status, body });
        }

        let body: GenerateResponse = response.json().await?;
        debug!(response_len = body.response.len(), "Inference service answered");
        Ok(body.response)
    }
}
