//! Raw document loading for the offline build.
//!
//! PDF text is extracted with `pdf-extract`, which returns every page in one
//! string separated by form feeds. The segmenter treats those as line breaks.

use crate::types::{AppError, Result};
use std::path::Path;
use tracing::info;

/// Read a regulation document as plain text.
///
/// `.pdf` files go through text extraction; anything else is read as UTF-8.
pub async fn load_document(path: &Path) -> Result<String> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    let text = if is_pdf {
        let bytes = tokio::fs::read(path).await?;
        tokio::task::spawn_blocking(move || extract_pdf(&bytes))
            .await
            .map_err(|e| AppError::Internal(format!("PDF extraction task failed: {}", e)))??
    } else {
        tokio::fs::read_to_string(path).await?
    };

    info!(path = ?path, chars = text.len(), pdf = is_pdf, "Loaded document");
    Ok(text)
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| AppError::InvalidInput(format!("Failed to extract PDF text: {}", e)))?;

    if text.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "PDF contains no extractable text (scanned document?)".to_string(),
        ));
    }

    Ok(text)
}
