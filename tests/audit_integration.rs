//! Integration tests for audit log rotation and archival.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use surveillance_governance::archive::{ArchiveError, ArchiveUploader};
use surveillance_governance::audit::{AuditLog, RecordOutcome, RotationMarker};
use surveillance_governance::config::RotationConfig;
use tempfile::TempDir;

/// Uploader that remembers every upload it was asked to perform.
#[derive(Default)]
struct RecordingUploader {
    uploads: Mutex<Vec<(PathBuf, String, String)>>,
}

#[async_trait]
impl ArchiveUploader for RecordingUploader {
    async fn upload(&self, local: &Path, key: &str) -> Result<(), ArchiveError> {
        let content = tokio::fs::read_to_string(local)
            .await
            .map_err(|source| ArchiveError::Read {
                path: local.to_path_buf(),
                source,
            })?;
        self.uploads
            .lock()
            .unwrap()
            .push((local.to_path_buf(), key.to_string(), content));
        Ok(())
    }
}

/// Uploader that always fails.
struct FailingUploader;

#[async_trait]
impl ArchiveUploader for FailingUploader {
    async fn upload(&self, _local: &Path, key: &str) -> Result<(), ArchiveError> {
        Err(ArchiveError::Upload {
            key: key.to_string(),
            message: "bucket unreachable".to_string(),
        })
    }
}

fn audit_log(temp_dir: &TempDir, rotation: RotationConfig) -> AuditLog {
    AuditLog::new(
        temp_dir.path().join("reports").join("audit.log"),
        temp_dir.path().join("reports").join("archive"),
        rotation,
    )
}

fn by_bytes(max_bytes: u64) -> RotationConfig {
    RotationConfig {
        max_lines: 0,
        max_bytes,
    }
}

/// Write events until one call rotates; returns the pre-call content and the outcome.
async fn record_until_rotation(log: &AuditLog) -> (String, RecordOutcome) {
    for i in 0..1000 {
        let before = tokio::fs::read_to_string(log.path())
            .await
            .unwrap_or_default();
        let outcome = log
            .record("clean_csv", json!({"rows_after_clean": i}))
            .await
            .expect("Failed to record event");
        if matches!(outcome, RecordOutcome::Rotated(_)) {
            return (before, outcome);
        }
    }
    panic!("log never rotated");
}

#[tokio::test]
async fn test_line_rotation_keeps_last_l_events() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let max_lines = 10;
    let log = audit_log(
        &temp_dir,
        RotationConfig {
            max_lines,
            max_bytes: 0,
        },
    );

    for i in 0..max_lines + 5 {
        log.record("load_csv", json!({"n": i}))
            .await
            .expect("Failed to record event");
    }

    let raw = tokio::fs::read_to_string(log.path()).await.unwrap();
    assert_eq!(raw.lines().count(), max_lines);

    let events = log.read_events().await.unwrap();
    let ns: Vec<u64> = events
        .iter()
        .map(|e| e.details["n"].as_u64().unwrap())
        .collect();
    assert_eq!(ns.first(), Some(&5));
    assert_eq!(ns.last(), Some(&14));
    assert!(!ns.contains(&4));

    // Line trimming never archives.
    assert!(log.archives().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_byte_rotation_archives_exact_previous_content() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log = audit_log(&temp_dir, by_bytes(400));

    let (before, outcome) = record_until_rotation(&log).await;
    let RecordOutcome::Rotated(rotation) = outcome else {
        unreachable!()
    };

    // Archive holds everything that was in the log, plus the triggering event.
    let archived = tokio::fs::read_to_string(&rotation.archived_to).await.unwrap();
    assert!(archived.starts_with(&before));
    assert_eq!(archived.lines().count(), before.lines().count() + 1);
    assert!(archived.len() > 400);

    // Active log restarted with exactly one marker.
    let events = log.read_events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "rotated");
    assert_eq!(rotation.marker, RotationMarker::Rotated);

    let file_name = rotation
        .archived_to
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert!(file_name.starts_with("audit."));
    assert!(file_name.ends_with(".log"));
    assert_eq!(log.archives().await.unwrap(), vec![rotation.archived_to]);
}

#[tokio::test]
async fn test_rotation_uploads_when_configured() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let uploader = Arc::new(RecordingUploader::default());
    let log = audit_log(&temp_dir, by_bytes(300)).with_uploader(uploader.clone(), "srag/audit/");

    let (_, outcome) = record_until_rotation(&log).await;
    let RecordOutcome::Rotated(rotation) = outcome else {
        unreachable!()
    };

    assert_eq!(rotation.marker, RotationMarker::RotatedUploaded);
    let file_name = rotation.archived_to.file_name().unwrap().to_string_lossy();
    let expected_key = format!("srag/audit/{file_name}");
    assert_eq!(rotation.remote_key.as_deref(), Some(expected_key.as_str()));

    let uploads = uploader.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, rotation.archived_to);
    assert_eq!(uploads[0].1, expected_key);
    assert!(!uploads[0].2.is_empty());

    let events = log.read_events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "rotated_uploaded");
    assert_eq!(events[0].details["s3_key"], expected_key);

    // Local copy is kept after upload.
    assert!(rotation.archived_to.exists());
}

#[tokio::test]
async fn test_upload_failure_degrades_to_local_only() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log = audit_log(&temp_dir, by_bytes(300)).with_uploader(Arc::new(FailingUploader), "audit/");

    let (before, outcome) = record_until_rotation(&log).await;
    let RecordOutcome::Rotated(rotation) = outcome else {
        unreachable!()
    };

    assert_eq!(rotation.marker, RotationMarker::RotatedLocalOnly);
    assert!(rotation.remote_key.is_none());

    // No audit data lost.
    let archived = tokio::fs::read_to_string(&rotation.archived_to).await.unwrap();
    assert!(archived.starts_with(&before));

    let events = log.read_events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "rotated_local_only");
    assert!(events[0].details["error"]
        .as_str()
        .unwrap()
        .contains("bucket unreachable"));

    // Logging keeps working after a failed upload.
    log.record("after", json!({})).await.unwrap();
    assert_eq!(log.read_events().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_line_trim_runs_before_byte_rotation() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log = audit_log(
        &temp_dir,
        RotationConfig {
            max_lines: 2,
            max_bytes: 150,
        },
    );

    let (_, outcome) = record_until_rotation(&log).await;
    let RecordOutcome::Rotated(rotation) = outcome else {
        unreachable!()
    };

    // The archived file was already trimmed to the line limit.
    let archived = tokio::fs::read_to_string(&rotation.archived_to).await.unwrap();
    assert!(archived.lines().count() <= 2);
}

#[tokio::test]
async fn test_repeated_rotations_never_overwrite_archives() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log = audit_log(&temp_dir, by_bytes(1));

    for i in 0..5 {
        log.record("big", json!({"i": i})).await.unwrap();
    }

    let archives = log.archives().await.unwrap();
    assert_eq!(archives.len(), 5);

    let mut seen = Vec::new();
    for archive in &archives {
        let content = tokio::fs::read_to_string(archive).await.unwrap();
        for line in content.lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            if value["event"] == "big" {
                seen.push(value["details"]["i"].as_u64().unwrap());
            }
        }
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_concurrent_writers_do_not_interleave() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log = audit_log(&temp_dir, RotationConfig::default());

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let log = log.clone();
            tokio::spawn(async move {
                log.record("worker", json!({"i": i, "payload": "x".repeat(512)}))
                    .await
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let raw = tokio::fs::read_to_string(log.path()).await.unwrap();
    assert_eq!(raw.lines().count(), 50);
    assert_eq!(log.read_events().await.unwrap().len(), 50);
}

#[tokio::test]
async fn test_concurrent_writers_with_line_trim() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log = audit_log(
        &temp_dir,
        RotationConfig {
            max_lines: 7,
            max_bytes: 0,
        },
    );

    let handles: Vec<_> = (0..40)
        .map(|i| {
            let log = log.clone();
            tokio::spawn(async move { log.record("worker", json!({"i": i})).await.unwrap() })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let raw = tokio::fs::read_to_string(log.path()).await.unwrap();
    assert_eq!(raw.lines().count(), 7);
    assert_eq!(log.read_events().await.unwrap().len(), 7);
}
