//! # zoneqa-vector
//!
//! An exact, order-preserving vector index for the zoneqa regulation corpus.
//!
//! ## Features
//!
//! - **Exact search**: every row is scanned, so results never miss a neighbour
//! - **Stable rows**: row `i` is the `i`-th vector added, which keeps rows
//!   aligned with the chunk file they were embedded from
//! - **Deterministic ranking**: ascending squared Euclidean distance, ties
//!   broken by the smaller row
//! - **Persistence**: compact `postcard` encoding, written and read with Tokio
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use zoneqa_vector::FlatIndex;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), zoneqa_vector::Error> {
//!     let index = FlatIndex::build(3, &[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]])?;
//!     index.save("data/embeddings.index").await?;
//!
//!     let index = FlatIndex::load("data/embeddings.index").await?;
//!     let hits = index.search(&[0.9, 0.1, 0.0], 1)?;
//!     assert_eq!(hits[0].row, 0);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod distance;
pub mod error;
pub mod index;
pub mod persistence;
pub mod types;

// Re-exports for convenience
pub use error::{Error, Result};
pub use index::FlatIndex;
pub use types::SearchHit;

use std::path::Path;

impl FlatIndex {
    /// Persist the index to `path`.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        persistence::save_index(path.as_ref(), self).await
    }

    /// Load an index from `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        persistence::load_index(path.as_ref()).await
    }
}
