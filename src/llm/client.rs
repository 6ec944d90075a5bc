//! LLM Client abstractions and provider management
//!
//! This module provides a unified interface for the completion capability:
//! - **Mistral**: La Plateforme or any OpenAI-compatible chat completions API
//! - **Ollama**: local inference through `ollama-rs` (feature `ollama`)

use crate::llm::stream::CompletionStream;
use crate::types::{AppError, Message, Result};
use crate::utils::toml_config::{ProviderConfig, ZoneqaConfig};
use async_trait::async_trait;

/// Generic LLM client trait for provider abstraction
///
/// All LLM providers implement this trait, allowing for easy swapping
/// between providers without changing application code.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Complete a conversation and return the whole answer.
    async fn complete(&self, messages: &[Message], temperature: f32) -> Result<String>;

    /// Complete a conversation, yielding the answer as it is produced.
    async fn complete_stream(
        &self,
        messages: &[Message],
        temperature: f32,
    ) -> Result<CompletionStream>;

    /// Generate with system prompt, deterministically.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.complete(&[Message::system(system), Message::user(prompt)], 0.0)
            .await
    }

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// Mistral, or another OpenAI-compatible endpoint
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Mistral {
    ///     api_key: "...".to_string(),
    ///     api_base: "https://api.mistral.ai/v1".to_string(),
    ///     model: "mistral-large-latest".to_string(),
    /// };
    /// ```
    Mistral {
        api_key: String,
        api_base: String,
        model: String,
    },

    /// Ollama local LLM provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "llama3.2".to_string(),
    /// };
    /// ```
    Ollama { base_url: String, model: String },
}

impl Provider {
    /// Resolve the provider used by `[generation]`, reading its secret from
    /// the environment.
    pub fn from_config(config: &ZoneqaConfig) -> Result<Self> {
        let model = config.generation.model.clone();

        match config.generation_provider()? {
            ProviderConfig::Mistral {
                api_key_env,
                api_base,
            } => {
                let api_key = config.resolve_env(api_key_env).ok_or_else(|| {
                    AppError::Configuration(format!("{} is not set", api_key_env))
                })?;
                Ok(Provider::Mistral {
                    api_key,
                    api_base: api_base.clone(),
                    model,
                })
            }
            ProviderConfig::Ollama { base_url } => Ok(Provider::Ollama {
                base_url: base_url.clone(),
                model,
            }),
        }
    }

    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's feature is not compiled in.
    pub fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            Provider::Mistral {
                api_key,
                api_base,
                model,
            } => Ok(Box::new(super::mistral::MistralClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
            ))),

            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Box::new(
                super::ollama::OllamaClient::new(base_url, model.clone())?,
            )),

            #[cfg(not(feature = "ollama"))]
            Provider::Ollama { .. } => Err(AppError::Configuration(
                "Ollama support is not compiled in; rebuild with --features ollama".to_string(),
            )),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Mistral { .. } => "Mistral",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Mistral { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }
}
