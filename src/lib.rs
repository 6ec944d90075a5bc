//! # zoneqa - Grounded question answering over zoning regulations
//!
//! Answers "what may I build here?" questions from the articles of a
//! municipal zoning regulation (Plano Diretor Municipal).
//!
//! ## Overview
//!
//! zoneqa can be used in two ways:
//!
//! 1. **As a command-line tool** - Run the `zoneqa` binary
//! 2. **As a library** - Import components into your own Rust project
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use zoneqa::rag::{AnswerPipeline, Corpus, Retriever};
//! use zoneqa::{Generator, Provider, ZoneqaConfig};
//! use std::sync::Arc;
//!
//! let config = ZoneqaConfig::load("zoneqa.toml")?;
//! let embedder = zoneqa::rag::embeddings::create_embedder(&config)?;
//! let corpus = Corpus::load(
//!     &config.corpus.chunks_path,
//!     &config.corpus.index_path,
//!     config.embedding.dimensions,
//! )
//! .await?;
//!
//! let client = Provider::from_config(&config)?.create_client()?;
//! let generator = Generator::new(Arc::from(client), None, config.generation.timeout());
//! let pipeline = AnswerPipeline::new(
//!     Retriever::new(embedder, Arc::new(corpus))?,
//!     generator,
//!     config.retrieval.clone(),
//! );
//!
//! let answer = pipeline.chat("Qual a altura máxima das fachadas?").await?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama chat via `ollama-rs` (default) |
//! | `minimal` | Mistral / OpenAI-compatible HTTP only |
//!
//! ## Modules
//!
//! - [`rag`] - Segmentation, embeddings, corpus, retrieval, prompts and the answer pipeline
//! - [`llm`] - Completion clients and the generator
//! - [`zoning`] - Zoning attributes from a WMS map service
//! - [`cli`] - Command-line interface
//! - [`types`] - Common types and error handling
//! - [`utils`] - Configuration and timeouts

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Command-line interface.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Retrieval Augmented Generation (RAG) components.
pub mod rag;
/// Core types (messages, errors).
pub mod types;
/// Configuration and timeout utilities.
pub mod utils;
/// Zoning attribute lookup.
pub mod zoning;

// Re-export commonly used types
pub use llm::{CompletionStream, Generator, LLMClient, Provider};
pub use rag::{Answer, AnswerPipeline, Corpus, Embedder, Retriever, Segmenter};
pub use types::{AppError, Result};
pub use utils::toml_config::ZoneqaConfig;
pub use zoning::{Coordinates, LayerSource, WmsClient};
