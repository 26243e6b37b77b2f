//! Staging of uploaded reports on disk.
//!
//! The PDF library works on paths, so the upload is written to a named temp
//! file that lives exactly as long as [`with_staged_pdf`] runs. The file is
//! closed and unlinked before the function returns, whatever the outcome.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

use crate::error::{AnalysisError, ExtractionError, Result};

const PDF_MAGIC: &[u8] = b"%PDF";

/// Reject uploads that cannot possibly be a PDF before touching the disk.
pub fn check_pdf_bytes(bytes: &[u8]) -> std::result::Result<(), ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::EmptyUpload);
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(ExtractionError::NotAPdf {
            magic: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
        });
    }
    Ok(())
}

fn stage(bytes: &[u8], dir: Option<&Path>) -> std::io::Result<NamedTempFile> {
    let mut builder = Builder::new();
    builder.prefix("healthsync-").suffix(".pdf");

    let mut file = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

/// Write `bytes` to a scoped temp file, run `process` with its path, then
/// remove the file.
pub async fn with_staged_pdf<F, Fut, T>(bytes: &[u8], dir: Option<&Path>, process: F) -> Result<T>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    check_pdf_bytes(bytes)?;

    let staged = stage(bytes, dir).map_err(AnalysisError::Io)?;
    let path = staged.path().to_path_buf();
    debug!(path = %path.display(), bytes = bytes.len(), "Staged uploaded report");

    let outcome = process(path.clone()).await;

    // Dropping the handle on unwind also unlinks the file; this path reports failures.
    if let Err(e) = staged.close() {
        warn!(path = %path.display(), error = %e, "Failed to remove staged report");
    }

    outcome
}
