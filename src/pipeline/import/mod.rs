//! Upload acceptance: which files may enter a run.
//!
//! One file per run. Accepted by extension (`png`, `jpg`, `jpeg`, `dcm`),
//! then sniffed by magic bytes before any decoding happens.

pub mod format;

pub use format::*;

use std::path::Path;

use tracing::warn;

use super::AnalysisError;

/// Extensions the upload surface accepts (compared case-insensitively).
pub const ACCEPTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "dcm"];

/// A single uploaded file, accepted but not yet decoded.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    /// Accept an in-memory upload. Rejects names outside the accept-list.
    pub fn new(file_name: &str, bytes: Vec<u8>) -> Result<Self, AnalysisError> {
        let file_name = sanitize_filename(file_name);
        if !is_accepted_extension(&file_name) {
            warn!(file = %file_name, "Upload rejected by extension accept-list");
            return Err(AnalysisError::UnsupportedFormat(file_name));
        }
        Ok(Self { file_name, bytes })
    }

    /// Read and accept a file from disk.
    pub fn from_path(path: &Path) -> Result<Self, AnalysisError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        if !is_accepted_extension(&name) {
            warn!(path = %path.display(), "Upload rejected by extension accept-list");
            return Err(AnalysisError::UnsupportedFormat(name));
        }
        let bytes = std::fs::read(path)?;
        Self::new(&name, bytes)
    }

    /// Magic-byte classification of the payload.
    pub fn payload_kind(&self) -> PayloadKind {
        sniff_payload(&self.bytes)
    }
}

/// True when the file name carries one of [`ACCEPTED_EXTENSIONS`].
pub fn is_accepted_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| accepted.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Sanitize a filename: strip path components, limit length
pub fn sanitize_filename(original: &str) -> String {
    let name = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");

    let clean: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .take(255)
        .collect();

    if clean.is_empty() {
        "upload".to_string()
    } else {
        clean
    }
}
