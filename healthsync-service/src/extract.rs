use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, ExtractionError, Result};

/// Pull the text layer out of a PDF on disk.
///
/// Image-only documents have no text layer and are rejected; there is no OCR
/// fallback.
pub async fn extract_text(pdf_path: &Path) -> Result<String> {
    let path: PathBuf = pdf_path.to_path_buf();

    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
        .await
        .map_err(|e| {
            // pdf-extract panics on some malformed documents
            warn!(error = %e, "PDF text extraction aborted");
            ExtractionError::Unreadable("the PDF parser aborted on this document".to_string())
        })?
        .map_err(|e| ExtractionError::Unreadable(e.to_string()))?;

    let text = extracted.trim().to_string();
    if text.is_empty() {
        return Err(AnalysisError::Extraction(ExtractionError::NoText));
    }

    info!(chars = text.chars().count(), "Extracted document text");
    if text.chars().count() < 100 {
        debug!(snippet = %text, "Short document text");
    }

    Ok(text)
}
