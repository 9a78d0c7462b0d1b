//! Audit entry types.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::AuditError;

/// One immutable line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event was recorded (UTC).
    pub timestamp: DateTime<Utc>,
    /// Event name, e.g. `load_csv` or `guardrail_violations`.
    pub event: String,
    /// Free-form event details.
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl AuditEvent {
    /// Create an event stamped with the current time.
    pub fn new(event: impl Into<String>, details: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            event: event.into(),
            details: into_object(details, "value"),
        }
    }

    /// Set a custom timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Serialize as a single newline-terminated JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if the details cannot be serialized.
    pub fn to_line(&self) -> Result<String, AuditError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Marker event written to a fresh log after a byte-size rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMarker {
    /// Archived locally, no remote target configured.
    Rotated,
    /// Archived locally and uploaded.
    RotatedUploaded,
    /// Archived locally, upload failed.
    RotatedLocalOnly,
}

impl RotationMarker {
    /// Returns the event name written to the log.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rotated => "rotated",
            Self::RotatedUploaded => "rotated_uploaded",
            Self::RotatedLocalOnly => "rotated_local_only",
        }
    }
}

/// Result of a byte-size rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation {
    /// Where the previous active log now lives.
    pub archived_to: PathBuf,
    /// Which marker was written to the fresh log.
    pub marker: RotationMarker,
    /// Remote object key, when the upload succeeded.
    pub remote_key: Option<String>,
}

/// What happened during a single `record` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The event was appended, no archive was produced.
    Appended,
    /// The event was appended and the log was then archived.
    Rotated(Rotation),
}

/// Coerce arbitrary JSON into an object, wrapping non-objects under `key`.
pub(crate) fn into_object(value: Value, key: &str) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert(key.to_string(), other);
            map
        }
    }
}
