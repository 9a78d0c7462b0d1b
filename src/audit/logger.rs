//! Append-only audit log with line-count trimming and byte-size archival.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::error::AuditError;
use super::types::{AuditEvent, RecordOutcome, Rotation, RotationMarker};
use crate::archive::{remote_key, ArchiveUploader};
use crate::config::RotationConfig;

/// Remote destination for rotated files.
#[derive(Clone)]
struct RemoteArchive {
    uploader: Arc<dyn ArchiveUploader>,
    prefix: String,
}

/// Newline-delimited JSON audit log.
///
/// Clones share one writer lock, so the append, the line trim and the local
/// rotation of a single call are never interleaved with another writer.
/// Remote upload after a rotation runs outside the lock.
#[derive(Clone)]
pub struct AuditLog {
    path: PathBuf,
    archive_dir: PathBuf,
    rotation: RotationConfig,
    remote: Option<RemoteArchive>,
    lock: Arc<Mutex<()>>,
}

impl fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLog")
            .field("path", &self.path)
            .field("archive_dir", &self.archive_dir)
            .field("rotation", &self.rotation)
            .field("remote_prefix", &self.remote.as_ref().map(|r| &r.prefix))
            .finish_non_exhaustive()
    }
}

impl AuditLog {
    /// Create a log writing to `path`, archiving rotated files into `archive_dir`.
    ///
    /// Nothing is touched on disk until the first event is recorded.
    pub fn new(
        path: impl Into<PathBuf>,
        archive_dir: impl Into<PathBuf>,
        rotation: RotationConfig,
    ) -> Self {
        Self {
            path: path.into(),
            archive_dir: archive_dir.into(),
            rotation,
            remote: None,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Upload every rotated file through `uploader`, keyed under `prefix`.
    #[must_use]
    pub fn with_uploader(
        mut self,
        uploader: Arc<dyn ArchiveUploader>,
        prefix: impl Into<String>,
    ) -> Self {
        self.remote = Some(RemoteArchive {
            uploader,
            prefix: prefix.into(),
        });
        self
    }

    /// Path of the active log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding rotated files.
    #[must_use]
    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Record a named event with details.
    ///
    /// # Errors
    ///
    /// Returns an error only if the event itself could not be appended.
    /// Rotation failures are logged and swallowed.
    pub async fn record(
        &self,
        event: impl Into<String>,
        details: Value,
    ) -> Result<RecordOutcome, AuditError> {
        self.append(AuditEvent::new(event, details)).await
    }

    /// Append a prepared event, then run the line trim and byte rotation passes.
    ///
    /// # Errors
    ///
    /// Returns an error only if the event itself could not be appended.
    pub async fn append(&self, event: AuditEvent) -> Result<RecordOutcome, AuditError> {
        let line = event.to_line()?;

        let archived = {
            let _guard = self.lock.lock().await;
            ensure_parent(&self.path).await?;
            append_line(&self.path, &line).await?;

            if let Err(e) = self.trim_to_max_lines().await {
                tracing::warn!(error = %e, path = %self.path.display(), "Audit line trim failed");
            }

            match self.archive_if_oversized().await {
                Ok(archived) => archived,
                Err(e) => {
                    tracing::warn!(error = %e, path = %self.path.display(), "Audit rotation failed");
                    None
                }
            }
        };

        match archived {
            Some(archived_to) => Ok(RecordOutcome::Rotated(
                self.finish_rotation(archived_to).await,
            )),
            None => Ok(RecordOutcome::Appended),
        }
    }

    /// Read back every event in the active log.
    ///
    /// Lines that do not parse are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn read_events(&self) -> Result<Vec<AuditEvent>, AuditError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(AuditError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut events = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(line = index + 1, error = %e, "Skipping malformed audit line");
                }
            }
        }
        Ok(events)
    }

    /// List rotated files, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive directory exists but cannot be listed.
    pub async fn archives(&self) -> Result<Vec<PathBuf>, AuditError> {
        let read_err = |source| AuditError::Read {
            path: self.archive_dir.clone(),
            source,
        };

        let mut entries = match tokio::fs::read_dir(&self.archive_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(read_err(source)),
        };

        let mut archives = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("audit.") && name.ends_with(".log") {
                archives.push(entry.path());
            }
        }
        archives.sort_by_key(|p| archive_sort_key(p));
        Ok(archives)
    }

    async fn trim_to_max_lines(&self) -> Result<(), AuditError> {
        let max_lines = self.rotation.max_lines;
        if max_lines == 0 {
            return Ok(());
        }

        let content =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| AuditError::Read {
                    path: self.path.clone(),
                    source,
                })?;

        let lines: Vec<&str> = content.lines().collect();
        if lines.len() <= max_lines {
            return Ok(());
        }

        let dropped = lines.len() - max_lines;
        let mut kept = lines[dropped..].join("\n");
        kept.push('\n');
        rewrite_atomically(&self.path, kept.as_bytes()).await?;

        tracing::debug!(dropped, kept = max_lines, "Trimmed audit log");
        Ok(())
    }

    /// Move the active file into the archive once it exceeds `max_bytes`.
    ///
    /// Leaves an empty active file behind.
    async fn archive_if_oversized(&self) -> Result<Option<PathBuf>, AuditError> {
        let max_bytes = self.rotation.max_bytes;
        if max_bytes == 0 {
            return Ok(None);
        }

        let size = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(AuditError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if size <= max_bytes {
            return Ok(None);
        }

        tokio::fs::create_dir_all(&self.archive_dir)
            .await
            .map_err(|source| AuditError::CreateDir {
                path: self.archive_dir.clone(),
                source,
            })?;

        let target = next_archive_path(&self.archive_dir, Utc::now()).await;
        move_file(&self.path, &target).await?;

        tokio::fs::File::create(&self.path)
            .await
            .map_err(|source| AuditError::Write {
                path: self.path.clone(),
                source,
            })?;

        tracing::info!(
            size,
            max_bytes,
            archived_to = %target.display(),
            "Rotated audit log"
        );
        Ok(Some(target))
    }

    /// Offload the archived file if configured, then write the marker event.
    async fn finish_rotation(&self, archived_to: PathBuf) -> Rotation {
        let mut details = Map::new();
        details.insert(
            "archived_to".to_string(),
            Value::String(archived_to.display().to_string()),
        );

        let (marker, remote_key) = match &self.remote {
            None => (RotationMarker::Rotated, None),
            Some(remote) => {
                let key = remote_key(&remote.prefix, &archived_to);
                match remote.uploader.upload(&archived_to, &key).await {
                    Ok(()) => {
                        details.insert("s3_key".to_string(), Value::String(key.clone()));
                        (RotationMarker::RotatedUploaded, Some(key))
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, key = %key, "Archive upload failed, kept local copy");
                        details.insert("error".to_string(), Value::String(e.to_string()));
                        (RotationMarker::RotatedLocalOnly, None)
                    }
                }
            }
        };

        let event = AuditEvent::new(marker.as_str(), Value::Object(details));
        if let Err(e) = self.write_marker(&event).await {
            tracing::warn!(error = %e, marker = marker.as_str(), "Failed to write rotation marker");
        }

        Rotation {
            archived_to,
            marker,
            remote_key,
        }
    }

    async fn write_marker(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let line = event.to_line()?;
        let _guard = self.lock.lock().await;
        ensure_parent(&self.path).await?;
        append_line(&self.path, &line).await
    }
}

/// Create the parent directory of `path` if it is missing.
pub(super) async fn ensure_parent(path: &Path) -> Result<(), AuditError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| AuditError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
    }
    Ok(())
}

/// Append one already newline-terminated line.
pub(super) async fn append_line(path: &Path, line: &str) -> Result<(), AuditError> {
    let write_err = |source| AuditError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(write_err)?;
    file.write_all(line.as_bytes()).await.map_err(write_err)?;
    file.flush().await.map_err(write_err)?;
    Ok(())
}

/// Replace `path` with `content` via temp file + sync + rename.
async fn rewrite_atomically(path: &Path, content: &[u8]) -> Result<(), AuditError> {
    let write_err = |source| AuditError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut file = tokio::fs::File::create(&temp_path)
        .await
        .map_err(write_err)?;
    file.write_all(content).await.map_err(write_err)?;
    file.sync_data().await.map_err(write_err)?;
    drop(file);

    tokio::fs::rename(&temp_path, path).await.map_err(write_err)
}

/// Move a file, falling back to copy + remove when rename is not possible.
///
/// The source is only removed after the copy succeeded.
async fn move_file(from: &Path, to: &Path) -> Result<(), AuditError> {
    let move_err = |source| AuditError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!(error = %e, "Rename failed, copying archive instead");
            tokio::fs::copy(from, to).await.map_err(move_err)?;
            tokio::fs::remove_file(from).await.map_err(move_err)
        }
    }
}

/// First free `audit.<stamp>.log` name, with `_<n>` appended on collision.
async fn next_archive_path(dir: &Path, now: DateTime<Utc>) -> PathBuf {
    let stamp = now.format("%Y%m%dT%H%M%SZ").to_string();
    let mut candidate = dir.join(format!("audit.{stamp}.log"));
    let mut n = 1u32;
    while tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        candidate = dir.join(format!("audit.{stamp}_{n}.log"));
        n += 1;
    }
    candidate
}

/// Sort key `(stamp, collision index)` for an archive file name.
fn archive_sort_key(path: &Path) -> (String, u32) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let core = name
        .strip_prefix("audit.")
        .and_then(|s| s.strip_suffix(".log"))
        .unwrap_or(&name);

    match core.split_once('_') {
        Some((stamp, n)) => (stamp.to_string(), n.parse().unwrap_or(u32::MAX)),
        None => (core.to_string(), 0),
    }
}
