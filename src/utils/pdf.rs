//! PDF text extraction utilities.
//!
//! Extraction uses the pdf-extract crate. It is CPU-bound and synchronous, so
//! async callers should run it through `tokio::task::spawn_blocking`.

use std::path::Path;
use thiserror::Error;

/// Placeholder text for PDFs that parse but contain no extractable text
pub const EMPTY_TEXT_PLACEHOLDER: &str = "[Could not extract text content from PDF]";

/// Errors that can occur during PDF extraction
#[derive(Debug, Error)]
pub enum PdfExtractError {
    #[error("Failed to extract text from PDF: {0}")]
    ExtractionFailed(String),

    #[error("File not found or not a valid PDF: {0}")]
    InvalidFile(String),
}

/// Extract text from a PDF file.
///
/// Pages are joined in document order. A document with no text layer (e.g.
/// a scanned paper) yields an empty string rather than an error.
pub fn extract_text(path: &Path) -> Result<String, PdfExtractError> {
    if !path.is_file() {
        return Err(PdfExtractError::InvalidFile(format!(
            "File not found: {}",
            path.display()
        )));
    }

    match pdf_extract::extract_text(path) {
        Ok(text) => {
            if text.trim().is_empty() {
                tracing::debug!("Extracted empty text from PDF: {}", path.display());
            }
            Ok(text)
        }
        Err(e) => Err(PdfExtractError::ExtractionFailed(e.to_string())),
    }
}

/// Trim extracted text, substitute the placeholder for empty text and cut it
/// to `max_len` characters with a visible marker.
pub fn finalize_text(raw: &str, max_len: Option<usize>) -> String {
    let text = raw.trim();
    if text.is_empty() {
        return EMPTY_TEXT_PLACEHOLDER.to_string();
    }

    match max_len {
        Some(limit) if text.chars().count() > limit => {
            let cut: String = text.chars().take(limit).collect();
            format!("{}... (truncated to {} chars)", cut, limit)
        }
        _ => text.to_string(),
    }
}
