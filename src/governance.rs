//! Governance facade used by every pipeline stage.
//!
//! `enabled` gates only the side-effecting writes (`audit`,
//! `record_decision`). Redaction and guardrail checks always run, so turning
//! governance off reduces observability, never safety.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::archive::{ArchiveUploader, S3Uploader};
use crate::audit::{AuditLog, DecisionLedger};
use crate::config::GovernanceConfig;
use crate::guardrail;
use crate::redact::Redactor;
use crate::tokens::TokenStore;

/// Outcome of [`Governance::review_metrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReview {
    /// Metrics with sensitive fields scrubbed.
    pub scrubbed: Map<String, Value>,
    /// Guardrail violation messages.
    pub violations: Vec<String>,
}

impl MetricsReview {
    /// Whether every guardrail passed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Entry point for audit, decision, redaction and guardrail operations.
#[derive(Debug, Clone)]
pub struct Governance {
    enabled: bool,
    audit_log: AuditLog,
    ledger: DecisionLedger,
    redactor: Redactor,
    tokens: TokenStore,
}

impl Governance {
    /// Build from configuration.
    ///
    /// When an archive bucket is configured, rotated logs are uploaded to S3
    /// using the default AWS credential chain.
    pub async fn open(config: &GovernanceConfig) -> Self {
        let uploader: Option<Arc<dyn ArchiveUploader>> = match &config.archive.bucket {
            Some(bucket) => Some(Arc::new(S3Uploader::from_env(bucket.clone()).await)),
            None => None,
        };
        Self::with_uploader(config, uploader).await
    }

    /// Build from configuration with an explicit remote archive target.
    pub async fn with_uploader(
        config: &GovernanceConfig,
        uploader: Option<Arc<dyn ArchiveUploader>>,
    ) -> Self {
        let mut audit_log = AuditLog::new(
            &config.paths.audit_log,
            &config.paths.archive_dir,
            config.rotation,
        );
        if let Some(uploader) = uploader {
            audit_log = audit_log.with_uploader(uploader, config.archive.prefix.clone());
        }

        let tokens = TokenStore::open(&config.paths.token_store).await;
        let redactor = Redactor::from_config(config, tokens.clone());

        tracing::debug!(
            enabled = config.enabled,
            mode = %config.pseudonymize.effective_mode(),
            sensitive_fields = config.sensitive_fields.len(),
            "Governance initialized"
        );

        Self {
            enabled: config.enabled,
            audit_log,
            ledger: DecisionLedger::new(&config.paths.decisions),
            redactor,
            tokens,
        }
    }

    /// Whether audit and decision writes are active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The underlying audit log.
    #[must_use]
    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    /// The underlying decision ledger.
    #[must_use]
    pub fn ledger(&self) -> &DecisionLedger {
        &self.ledger
    }

    /// The configured redactor.
    #[must_use]
    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Record an audit event. No-op when disabled; failures are logged, never raised.
    pub async fn audit(&self, event: &str, details: Value) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.audit_log.record(event, details).await {
            tracing::warn!(error = %e, event, "Failed to write audit event");
        }
    }

    /// Record an agent decision. No-op when disabled; failures are logged, never raised.
    pub async fn record_decision(&self, decision: Value) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.ledger.record(decision).await {
            tracing::warn!(error = %e, "Failed to write decision");
        }
    }

    /// Scrub sensitive fields from a copy of `record`.
    pub async fn scrub_record(&self, record: &Map<String, Value>) -> Map<String, Value> {
        self.redactor.scrub(record).await
    }

    /// Scrub every record of a cleaned record set.
    pub async fn scrub_records(&self, records: &[Map<String, Value>]) -> Vec<Map<String, Value>> {
        self.redactor.scrub_all(records).await
    }

    /// Guardrail violation messages for `metrics`.
    #[must_use]
    pub fn guardrail_check(&self, metrics: &Map<String, Value>) -> Vec<String> {
        guardrail::guardrail_check(metrics)
    }

    /// Stable token for `(field, value)`.
    ///
    /// # Errors
    ///
    /// Returns an error if a new token cannot be persisted.
    pub async fn tokenize(
        &self,
        field: &str,
        value: &str,
    ) -> Result<String, crate::tokens::TokenStoreError> {
        self.tokens.tokenize(field, value).await
    }

    /// Original value behind `token`, or `None` when unknown.
    pub async fn detokenize(&self, field: &str, token: &str) -> Option<String> {
        self.tokens.detokenize(field, token).await
    }

    /// Audit, scrub and validate a metrics record before it is narrated.
    ///
    /// Records the metric keys, any guardrail violations and a decision
    /// entry for `action`.
    pub async fn review_metrics(&self, action: &str, metrics: &Map<String, Value>) -> MetricsReview {
        let keys: Vec<&String> = metrics.keys().collect();
        self.audit("receive_metrics", json!({ "metrics_keys": keys }))
            .await;

        let scrubbed = self.scrub_record(metrics).await;
        let violations = self.guardrail_check(&scrubbed);

        if !violations.is_empty() {
            tracing::warn!(count = violations.len(), action, "Guardrail violations");
            self.audit("guardrail_violations", json!({ "violations": violations }))
                .await;
        }

        self.record_decision(json!({ "action": action, "violations": violations }))
            .await;

        MetricsReview {
            scrubbed,
            violations,
        }
    }
}
