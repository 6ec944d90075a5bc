//! Retrieval Augmented Generation (RAG) Pipeline
//!
//! Answers zoning questions from the text of a regulation document.
//!
//! # Module Structure
//!
//! - [`rag::document`](crate::rag::document) - Raw text extraction (plain text, PDF)
//! - [`rag::segmenter`](crate::rag::segmenter) - Splits the regulation into article units
//! - [`rag::embeddings`](crate::rag::embeddings) - Remote embedding providers (Mistral, Ollama)
//! - [`rag::corpus`](crate::rag::corpus) - Chunk file plus vector index, built and persisted together
//! - [`rag::retriever`](crate::rag::retriever) - Nearest-neighbour lookup over the corpus
//! - [`rag::prompt`](crate::rag::prompt) - Classification lines, grounded prompts and citations
//! - [`rag::pipeline`](crate::rag::pipeline) - End-to-end question answering
//!
//! # Pipeline
//!
//! 1. **Ingestion** - The document is segmented into articles, each article embedded
//! 2. **Storage** - Chunk file and index are written side by side; row `i` is chunk `i`
//! 3. **Classification** - Zoning attributes at a location become query lines
//! 4. **Retrieval** - Each line retrieves its nearest articles
//! 5. **Generation** - The LLM answers from the retrieved articles only
//!
//! # Example
//!
//! ```ignore
//! use zoneqa::rag::{corpus::Corpus, segmenter::Segmenter};
//!
//! let segmenter = Segmenter::from_config(&config.segmenter)?;
//! let units = segmenter.segment(&raw_text)?;
//!
//! let corpus = Corpus::build(units, embedder.as_ref(), config.embedding.batch_size).await?;
//! corpus.save(&config.corpus.chunks_path, &config.corpus.index_path).await?;
//! ```

pub mod corpus;
pub mod document;
pub mod embeddings;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod segmenter;

pub use corpus::{Chunk, Corpus};
pub use embeddings::Embedder;
pub use pipeline::{Answer, AnswerPipeline, StreamingAnswer};
pub use retriever::{RetrievedChunk, Retriever};
pub use segmenter::Segmenter;
