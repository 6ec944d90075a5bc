//! Query-time retrieval over a loaded [`Corpus`].

use crate::rag::corpus::{Chunk, Corpus};
use crate::rag::embeddings::Embedder;
use crate::types::{AppError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A chunk returned for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub position: usize,
    /// Squared Euclidean distance between query and chunk embeddings.
    pub distance: f32,
    pub chunk: Chunk,
}

/// Embeds queries and looks them up in the corpus index.
///
/// Cheap to clone; the corpus is shared read-only.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    corpus: Arc<Corpus>,
}

impl Retriever {
    /// Fails if the embedder and the index disagree on dimensionality.
    pub fn new(embedder: Arc<dyn Embedder>, corpus: Arc<Corpus>) -> Result<Self> {
        if embedder.dimensions() != corpus.dimensions() {
            return Err(AppError::DimensionMismatch {
                expected: corpus.dimensions(),
                actual: embedder.dimensions(),
            });
        }

        Ok(Self { embedder, corpus })
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// The `k` chunks nearest to `query`, nearest first.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let embedding = self.embedder.embed(query).await?;
        let hits = self.corpus.index().search(&embedding, k)?;

        let results = hits
            .into_iter()
            .map(|hit| {
                let chunk = self.corpus.chunk(hit.row).ok_or_else(|| {
                    AppError::Internal(format!("Index row {} has no chunk", hit.row))
                })?;
                Ok(RetrievedChunk {
                    position: hit.row,
                    distance: hit.distance,
                    chunk: chunk.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(returned = results.len(), "Retrieved chunks");
        Ok(results)
    }

    /// Retrieve `k` chunks per classification line and merge them.
    ///
    /// Lines are processed in order; a chunk already retrieved for an earlier
    /// line is not repeated.
    pub async fn retrieve_for_classification(
        &self,
        lines: &[String],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let mut seen = HashSet::new();
        let mut merged = Vec::new();

        for line in lines {
            for retrieved in self.retrieve(line, k).await? {
                if seen.insert(retrieved.position) {
                    merged.push(retrieved);
                }
            }
        }

        Ok(merged)
    }
}
