//! Archive error types.

use std::path::PathBuf;

/// Errors that can occur while offloading an archived log.
#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    /// Failed to read the archived file.
    #[error("Failed to read archive {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote storage rejected or failed the upload.
    #[error("Upload of {key} failed: {message}")]
    Upload { key: String, message: String },
}
