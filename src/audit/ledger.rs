//! Decision ledger: one JSON object per agent decision, never rotated.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::error::AuditError;
use super::logger::{append_line, ensure_parent};
use super::types::into_object;

/// Append-only JSONL record of higher-level decisions.
#[derive(Debug, Clone)]
pub struct DecisionLedger {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl DecisionLedger {
    /// Create a ledger writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the ledger file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a decision with an injected `timestamp`.
    ///
    /// Caller-supplied keys take precedence over the injected timestamp.
    /// A non-object decision is stored under `decision`.
    ///
    /// # Errors
    ///
    /// Returns an error if the line cannot be serialized or written.
    pub async fn record(&self, decision: Value) -> Result<(), AuditError> {
        let mut entry = Map::new();
        entry.insert(
            "timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );
        entry.extend(into_object(decision, "decision"));

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        ensure_parent(&self.path).await?;
        append_line(&self.path, &line).await
    }

    /// Read back all recorded decisions.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn read_decisions(&self) -> Result<Vec<Map<String, Value>>, AuditError> {
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

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed decision line");
                    None
                }
            })
            .collect())
    }
}
