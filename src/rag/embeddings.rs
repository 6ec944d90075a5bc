//! Text embedding backends.
//!
//! Chunks and queries must be embedded by the same model so that distances in
//! the index are meaningful. Two backends are provided:
//!
//! - [`MistralEmbedder`]: OpenAI-compatible `POST {api_base}/embeddings`
//!   (Mistral La Plateforme by default)
//! - [`OllamaEmbedder`]: a local Ollama server's `POST /api/embed`
//!
//! Neither retries or caches. Every request is bounded by the configured
//! timeout.

use crate::types::{AppError, Result};
use crate::utils::timeout::with_timeout;
use crate::utils::toml_config::{ProviderConfig, ZoneqaConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Maps text to fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input text (in order).
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| AppError::EmbeddingService("Empty embedding response".to_string()))
    }

    /// The dimensionality of the output vectors.
    fn dimensions(&self) -> usize;
}

/// Check that a backend returned exactly one vector of the right size per input.
fn validate_batch(vectors: &[Vec<f32>], expected_count: usize, dimensions: usize) -> Result<()> {
    if vectors.len() != expected_count {
        return Err(AppError::EmbeddingService(format!(
            "Expected {} embeddings, got {}",
            expected_count,
            vectors.len()
        )));
    }

    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(AppError::DimensionMismatch {
            expected: dimensions,
            actual: bad.len(),
        });
    }

    Ok(())
}

// ============= Mistral (OpenAI-compatible) =============

/// OpenAI-compatible embedding backend.
pub struct MistralEmbedder {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    dimensions: usize,
    timeout: Duration,
}

impl MistralEmbedder {
    pub fn new(
        api_key: String,
        api_base: String,
        model: String,
        dimensions: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
            dimensions,
            timeout,
        }
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::EmbeddingService(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingService(format!("{}: {}", status, body)));
        }

        let mut parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| AppError::EmbeddingService(format!("Invalid response: {}", e)))?;

        // Sort by index to maintain input order.
        parsed.data.sort_by_key(|item| item.index);
        if let Some((position, item)) = parsed
            .data
            .iter()
            .enumerate()
            .find(|(position, item)| item.index != *position)
        {
            return Err(AppError::EmbeddingService(format!(
                "Embedding index {} found at position {}",
                item.index, position
            )));
        }

        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedItem>,
}

#[derive(Deserialize)]
struct EmbedItem {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl Embedder for MistralEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = with_timeout(self.timeout, "Embedding request", self.request(texts)).await?;
        validate_batch(&vectors, texts.len(), self.dimensions)?;

        debug!(count = vectors.len(), model = %self.model, "Embedded batch");
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ============= Ollama =============

/// Embedder backed by a local Ollama instance.
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
    timeout: Duration,
}

impl OllamaEmbedder {
    pub fn new(base_url: String, model: String, dimensions: usize, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dimensions,
            timeout,
        }
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = OllamaEmbedRequest {
            model: &self.model,
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::EmbeddingService(format!("Ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingService(format!("{}: {}", status, body)));
        }

        let parsed: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| AppError::EmbeddingService(format!("Invalid Ollama response: {}", e)))?;

        Ok(parsed.embeddings)
    }
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = with_timeout(self.timeout, "Embedding request", self.request(texts)).await?;
        validate_batch(&vectors, texts.len(), self.dimensions)?;

        debug!(count = vectors.len(), model = %self.model, "Embedded batch");
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Create the embedder selected by `[embedding]`.
pub fn create_embedder(config: &ZoneqaConfig) -> Result<Arc<dyn Embedder>> {
    let embedding = &config.embedding;

    let embedder: Arc<dyn Embedder> = match config.embedding_provider()? {
        ProviderConfig::Mistral {
            api_key_env,
            api_base,
        } => {
            let api_key = config.resolve_env(api_key_env).ok_or_else(|| {
                AppError::Configuration(format!("{} is not set", api_key_env))
            })?;
            Arc::new(MistralEmbedder::new(
                api_key,
                api_base.clone(),
                embedding.model.clone(),
                embedding.dimensions,
                embedding.timeout(),
            ))
        }
        ProviderConfig::Ollama { base_url } => Arc::new(OllamaEmbedder::new(
            base_url.clone(),
            embedding.model.clone(),
            embedding.dimensions,
            embedding.timeout(),
        )),
    };

    Ok(embedder)
}
