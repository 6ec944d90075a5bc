//! The paired chunk sequence and vector index.
//!
//! Row `i` of the index is the embedding of chunk `i`. A [`Corpus`] can only
//! be constructed when the two agree in length, so a retrieved row always maps
//! to a chunk.

use crate::rag::embeddings::Embedder;
use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};
use zoneqa_vector::FlatIndex;

/// Delimiter written after every chunk in the chunk file.
pub const CHUNK_DELIMITER: &str = "\n\n";

/// One legal unit of the regulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 0-based position in the document; also the index row.
    pub position: usize,
    pub text: String,
}

impl Chunk {
    pub fn new(position: usize, text: impl Into<String>) -> Self {
        Self {
            position,
            text: text.into(),
        }
    }

    /// The unit heading, e.g. `Artigo 12.º`.
    pub fn label(&self) -> &str {
        self.text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
    }
}

/// Serialize chunk texts into the chunk file format.
pub fn format_chunk_file<S: AsRef<str>>(chunks: &[S]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        out.push_str(chunk.as_ref());
        out.push_str(CHUNK_DELIMITER);
    }
    out
}

/// Parse the chunk file format, dropping empty pieces.
pub fn parse_chunk_file(content: &str) -> Vec<Chunk> {
    content
        .split(CHUNK_DELIMITER)
        .filter(|piece| !piece.trim().is_empty())
        .enumerate()
        .map(|(position, piece)| Chunk::new(position, piece))
        .collect()
}

/// Write chunk texts to `path`, creating parent directories as needed.
pub async fn save_chunks<S: AsRef<str>>(path: &Path, chunks: &[S]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    tokio::fs::write(path, format_chunk_file(chunks)).await?;
    info!(path = ?path, chunks = chunks.len(), "Saved chunks");
    Ok(())
}

pub async fn load_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_chunk_file(&content))
}

/// Chunks and their index, loaded together and shared read-only.
#[derive(Debug)]
pub struct Corpus {
    chunks: Vec<Chunk>,
    index: FlatIndex,
}

impl Corpus {
    /// Pair chunks with their index. Fails unless there is one row per chunk.
    pub fn new(chunks: Vec<Chunk>, index: FlatIndex) -> Result<Self> {
        if chunks.len() != index.len() {
            return Err(AppError::CorpusMismatch {
                chunks: chunks.len(),
                rows: index.len(),
            });
        }

        if let Some((expected, chunk)) = chunks
            .iter()
            .enumerate()
            .find(|(i, chunk)| chunk.position != *i)
        {
            return Err(AppError::Internal(format!(
                "Chunk at position {} is labelled {}",
                expected, chunk.position
            )));
        }

        Ok(Self { chunks, index })
    }

    /// Embed `texts` in order and index them.
    #[instrument(skip(texts, embedder), fields(chunks = texts.len()))]
    pub async fn build(
        texts: Vec<String>,
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(AppError::InvalidInput("Batch size must be > 0".to_string()));
        }

        let mut index = FlatIndex::new(embedder.dimensions())?;
        for (batch_no, batch) in texts.chunks(batch_size).enumerate() {
            let refs: Vec<&str> = batch.iter().map(String::as_str).collect();
            let vectors = embedder.embed_batch(&refs).await?;
            if vectors.len() != refs.len() {
                return Err(AppError::EmbeddingService(format!(
                    "Expected {} embeddings, got {}",
                    refs.len(),
                    vectors.len()
                )));
            }
            for vector in &vectors {
                index.add(vector)?;
            }
            info!(batch = batch_no + 1, rows = index.len(), "Embedded batch");
        }

        let chunks = texts
            .into_iter()
            .enumerate()
            .map(|(position, text)| Chunk::new(position, text))
            .collect();

        Self::new(chunks, index)
    }

    /// Load both artifacts and check them against each other and against
    /// the configured embedding dimension.
    pub async fn load(
        chunks_path: &Path,
        index_path: &Path,
        expected_dimensions: usize,
    ) -> Result<Self> {
        let chunks = load_chunks(chunks_path).await?;
        let index = FlatIndex::load(index_path).await?;

        if index.dimensions() != expected_dimensions {
            return Err(AppError::DimensionMismatch {
                expected: expected_dimensions,
                actual: index.dimensions(),
            });
        }

        let corpus = Self::new(chunks, index)?;
        info!(
            chunks = corpus.len(),
            dimensions = corpus.dimensions(),
            "Loaded corpus"
        );
        Ok(corpus)
    }

    /// Write both artifacts.
    pub async fn save(&self, chunks_path: &Path, index_path: &Path) -> Result<()> {
        let texts: Vec<&str> = self.chunks.iter().map(|c| c.text.as_str()).collect();
        save_chunks(chunks_path, &texts).await?;
        self.index.save(index_path).await?;
        Ok(())
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, position: usize) -> Option<&Chunk> {
        self.chunks.get(position)
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
