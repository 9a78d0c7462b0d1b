//! Audit error types.

use std::path::PathBuf;

/// Errors that can occur during audit and ledger operations.
#[derive(thiserror::Error, Debug)]
pub enum AuditError {
    /// Failed to create parent directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to append to or rewrite a log file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a log file or directory.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to move the active log into the archive.
    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize an entry to JSON.
    #[error("JSON serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_dir_display() {
        let err = AuditError::CreateDir {
            path: PathBuf::from("/root/reports"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("Failed to create directory"));
        assert!(err.to_string().contains("/root/reports"));
    }

    #[test]
    fn test_move_display() {
        let err = AuditError::Move {
            from: PathBuf::from("reports/audit.log"),
            to: PathBuf::from("reports/archive/audit.20240101T000000Z.log"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        let msg = err.to_string();
        assert!(msg.contains("reports/audit.log"));
        assert!(msg.contains("audit.20240101T000000Z.log"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn test_write_display() {
        let err = AuditError::Write {
            path: PathBuf::from("/tmp/decisions.jsonl"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to write /tmp/decisions.jsonl: disk full"
        );
    }
}
