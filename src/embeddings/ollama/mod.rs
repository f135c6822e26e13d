
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::EmbeddingConfig;
use crate::embeddings::EmbeddingProvider;
use crate::{CourseDocsError, Result};

/// Blocking client for an Ollama-compatible embedding server.
///
/// Requests are made exactly once; transport and server failures map to
/// typed errors and the caller decides whether to retry.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: usize,
    dimension: usize,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    #[serde(rename = "input")]
    inputs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config
            .endpoint_url()
            .map_err(|e| CourseDocsError::Config(e.to_string()))?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: config.batch_size as usize,
            dimension: config.dimension as usize,
            agent,
        })
    }

    /// Verify the server is reachable and the configured model exists.
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        let models = self.list_models()?;

        if models.iter().any(|m| m.name == self.model) {
            debug!(model = %self.model, "embedding model is available");
            return Ok(());
        }

        let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        warn!(model = %self.model, ?available, "configured embedding model not found");
        Err(CourseDocsError::Embedding(format!(
            "model '{}' is not available on the embedding server (available: {:?})",
            self.model, available
        )))
    }

    /// List the models the server currently serves.
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .map_err(|e| CourseDocsError::Config(e.to_string()))?;

        let response_text = self
            .agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(request_error)?;

        let response: ModelsResponse = serde_json::from_str(&response_text).map_err(|e| {
            CourseDocsError::Embedding(format!("failed to parse models response: {e}"))
        })?;

        Ok(response.models)
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: self.model.clone(),
            inputs: texts.to_vec(),
        };

        let url = self
            .base_url
            .join("/api/embed")
            .map_err(|e| CourseDocsError::Config(e.to_string()))?;

        let request_json = serde_json::to_string(&request).map_err(|e| {
            CourseDocsError::Embedding(format!("failed to serialize embed request: {e}"))
        })?;

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(request_error)?;

        let response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            CourseDocsError::Embedding(format!("failed to parse embed response: {e}"))
        })?;

        if response.embeddings.len() != texts.len() {
            return Err(CourseDocsError::Embedding(format!(
                "embedding count mismatch: sent {} texts, got {} vectors",
                texts.len(),
                response.embeddings.len()
            )));
        }

        for vector in &response.embeddings {
            if vector.len() != self.dimension {
                return Err(CourseDocsError::Embedding(format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    self.dimension,
                    vector.len()
                )));
            }
        }

        Ok(response.embeddings)
    }
}

impl EmbeddingProvider for OllamaClient {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = texts.len(), "generating embeddings");

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            vectors.extend(self.embed_single_batch(batch)?);
        }
        Ok(vectors)
    }
}

/// Map a transport-level failure to the error taxonomy: timeouts and
/// connection failures are retryable, HTTP status errors are not.
fn request_error(error: ureq::Error) -> CourseDocsError {
    match error {
        ureq::Error::StatusCode(status) => {
            CourseDocsError::Embedding(format!("embedding server returned HTTP {status}"))
        }
        ureq::Error::Timeout(_) => {
            CourseDocsError::Timeout(format!("embedding request timed out: {error}"))
        }
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound | ureq::Error::Io(_) => {
            CourseDocsError::Network(format!("embedding request failed: {error}"))
        }
        other => CourseDocsError::Embedding(format!("embedding request error: {other}")),
    }
}
