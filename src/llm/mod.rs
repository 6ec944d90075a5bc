//! LLM Provider Clients and Abstractions
//!
//! This module wraps the completion capability used to turn a grounded prompt
//! into an answer. Provider-specific clients sit behind the [`LLMClient`]
//! trait; the [`Generator`] adds the system persona, deterministic sampling
//! and timeouts on top.
//!
//! # Supported Providers
//!
//! - Mistral (always available): La Plateforme or any OpenAI-compatible API
//! - `ollama` feature: local Ollama server
//!
//! # Example
//!
//! ```ignore
//! use zoneqa::llm::{Generator, Provider};
//! use std::sync::Arc;
//!
//! let client = Provider::from_config(&config)?.create_client()?;
//! let generator = Generator::new(Arc::from(client), None, config.generation.timeout());
//!
//! let answer = generator.generate(&prompt).await?;
//! ```
//!
//! # Streaming
//!
//! [`Generator::generate_streaming`] returns a [`CompletionStream`]. Dropping
//! it or calling [`CompletionStream::close`] releases the underlying request.

/// Core LLM client trait and provider selection.
pub mod client;
/// Answer generation with persona and timeouts.
pub mod generator;
/// Mistral / OpenAI-compatible chat completions.
pub mod mistral;
/// Cancellable completion stream.
pub mod stream;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use client::{LLMClient, Provider};
pub use generator::Generator;
pub use stream::CompletionStream;
