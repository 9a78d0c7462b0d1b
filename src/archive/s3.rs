//! S3 upload target for rotated logs.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::{primitives::ByteStream, Client};

use super::{ArchiveError, ArchiveUploader};

/// Uploads archived audit logs to an S3 bucket.
#[derive(Debug, Clone)]
pub struct S3Uploader {
    client: Client,
    bucket: String,
}

impl S3Uploader {
    /// Create an uploader from the default AWS credential chain.
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        Self::with_client(Client::new(&config), bucket)
    }

    /// Create with a custom client.
    pub fn with_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Target bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ArchiveUploader for S3Uploader {
    async fn upload(&self, local: &Path, key: &str) -> Result<(), ArchiveError> {
        let body = tokio::fs::read(local)
            .await
            .map_err(|source| ArchiveError::Read {
                path: local.to_path_buf(),
                source,
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/x-ndjson")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| ArchiveError::Upload {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(bucket = %self.bucket, key, "Uploaded audit archive");
        Ok(())
    }
}
