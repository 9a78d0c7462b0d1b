//! Remote offload of rotated audit logs.
//!
//! Uploads are best-effort: the local archive is always kept, so a failed
//! upload loses nothing.

mod error;
mod s3;

use std::path::Path;

use async_trait::async_trait;

pub use error::ArchiveError;
pub use s3::S3Uploader;

/// Destination for rotated audit log files.
#[async_trait]
pub trait ArchiveUploader: Send + Sync {
    /// Copy the file at `local` to remote storage under `key`.
    async fn upload(&self, local: &Path, key: &str) -> Result<(), ArchiveError>;
}

/// Object key for an archived file: the prefix concatenated with the file name.
#[must_use]
pub fn remote_key(prefix: &str, archived: &Path) -> String {
    let name = archived
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{prefix}{name}")
}
