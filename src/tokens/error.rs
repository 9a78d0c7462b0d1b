//! Token store error types.

use std::path::PathBuf;

/// Errors that can occur while persisting the token store.
#[derive(thiserror::Error, Debug)]
pub enum TokenStoreError {
    /// Failed to write the store document.
    #[error("Failed to persist token store {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize the store document.
    #[error("Failed to serialize token store: {0}")]
    Serialize(#[from] serde_json::Error),
}
