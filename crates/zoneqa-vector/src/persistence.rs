//! Persistence layer for zoneqa-vector.
//!
//! An index is written as a single `postcard`-encoded blob:
//!
//! ```text
//! StoredIndex { magic: "ZQVI", version, dimensions, rows, data: [f32; rows * dimensions] }
//! ```
//!
//! The row count is stored redundantly so truncated or foreign files are
//! rejected on load instead of producing a misaligned index.

use crate::error::{Error, Result};
use crate::index::FlatIndex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const MAGIC: [u8; 4] = *b"ZQVI";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredIndex {
    magic: [u8; 4],
    version: u32,
    dimensions: u64,
    rows: u64,
    data: Vec<f32>,
}

/// Encode an index into its on-disk representation.
pub fn encode(index: &FlatIndex) -> Result<Vec<u8>> {
    let stored = StoredIndex {
        magic: MAGIC,
        version: FORMAT_VERSION,
        dimensions: index.dimensions() as u64,
        rows: index.len() as u64,
        data: index.raw_data().to_vec(),
    };

    postcard::to_allocvec(&stored)
        .map_err(|e| Error::Persistence(format!("Failed to serialize index: {}", e)))
}

/// Decode an index from its on-disk representation.
pub fn decode(bytes: &[u8]) -> Result<FlatIndex> {
    let stored: StoredIndex = postcard::from_bytes(bytes)
        .map_err(|e| Error::Persistence(format!("Failed to parse index: {}", e)))?;

    if stored.magic != MAGIC {
        return Err(Error::Persistence("Not a zoneqa index file".to_string()));
    }

    if stored.version != FORMAT_VERSION {
        return Err(Error::Persistence(format!(
            "Unsupported index format version {} (expected {})",
            stored.version, FORMAT_VERSION
        )));
    }

    let dimensions = usize::try_from(stored.dimensions)
        .map_err(|_| Error::Persistence("Dimensions out of range".to_string()))?;
    let rows = usize::try_from(stored.rows)
        .map_err(|_| Error::Persistence("Row count out of range".to_string()))?;

    let index = FlatIndex::from_raw_parts(dimensions, stored.data)?;
    if index.len() != rows {
        return Err(Error::Persistence(format!(
            "Header declares {} rows but data holds {}",
            rows,
            index.len()
        )));
    }

    Ok(index)
}

/// Save an index to `path`, creating parent directories as needed.
pub async fn save_index(path: &Path, index: &FlatIndex) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let bytes = encode(index)?;

    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;

    info!(path = ?path, rows = index.len(), dimensions = index.dimensions(), "Saved index");
    Ok(())
}

/// Load an index previously written by [`save_index`].
pub async fn load_index(path: &Path) -> Result<FlatIndex> {
    let bytes = tokio::fs::read(path).await?;
    let index = decode(&bytes)?;

    debug!(path = ?path, bytes = bytes.len(), "Decoded index");
    info!(path = ?path, rows = index.len(), dimensions = index.dimensions(), "Loaded index");
    Ok(index)
}
