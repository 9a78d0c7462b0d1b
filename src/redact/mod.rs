//! Field-level redaction and pseudonymization of records.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::config::{GovernanceConfig, PseudonymMode};
use crate::tokens::TokenStore;

/// Prefix of hashed pseudonyms.
pub const HASH_PREFIX: &str = "pseud_";

/// Prefix of token pseudonyms.
pub const TOKEN_PREFIX: &str = "tok_";

/// Replacement strategy for sensitive values.
#[derive(Debug, Clone)]
pub enum Pseudonymizer {
    /// Replace with `null`.
    Null,
    /// Replace with `pseud_` + hex SHA-256 of salt and value.
    Hash { salt: String },
    /// Replace with `tok_` + a stable token from the store.
    Token(TokenStore),
}

/// Scrubs configured sensitive fields out of records.
#[derive(Debug, Clone)]
pub struct Redactor {
    fields: Vec<String>,
    pseudonymizer: Pseudonymizer,
}

impl Redactor {
    /// Create a redactor over `fields` using `pseudonymizer`.
    pub fn new<I, S>(fields: I, pseudonymizer: Pseudonymizer) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            pseudonymizer,
        }
    }

    /// Build from configuration. `tokens` is used only in token mode.
    #[must_use]
    pub fn from_config(config: &GovernanceConfig, tokens: TokenStore) -> Self {
        let pseudonymizer = match config.pseudonymize.effective_mode() {
            PseudonymMode::Hash => Pseudonymizer::Hash {
                salt: config.pseudonymize.salt.clone(),
            },
            PseudonymMode::Token => Pseudonymizer::Token(tokens),
            PseudonymMode::Null => Pseudonymizer::Null,
        };
        Self::new(config.sensitive_fields.iter().cloned(), pseudonymizer)
    }

    /// Configured sensitive field names.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Whether `field` is treated as sensitive.
    #[must_use]
    pub fn is_sensitive(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Return a copy of `record` with every sensitive field replaced.
    ///
    /// Absent fields stay absent and other fields pass through unchanged.
    pub async fn scrub(&self, record: &Map<String, Value>) -> Map<String, Value> {
        let mut out = record.clone();
        for field in &self.fields {
            if let Some(slot) = out.get_mut(field) {
                *slot = self.replace(field, slot).await;
            }
        }
        out
    }

    /// Scrub each record independently.
    pub async fn scrub_all(&self, records: &[Map<String, Value>]) -> Vec<Map<String, Value>> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            out.push(self.scrub(record).await);
        }
        out
    }

    /// Recover the original value of a token-mode pseudonym.
    ///
    /// Hash and null replacements are one-way and always yield `None`.
    pub async fn reveal(&self, field: &str, scrubbed: &str) -> Option<String> {
        let Pseudonymizer::Token(store) = &self.pseudonymizer else {
            return None;
        };
        let token = scrubbed.strip_prefix(TOKEN_PREFIX)?;
        store.detokenize(field, token).await
    }

    async fn replace(&self, field: &str, original: &Value) -> Value {
        match &self.pseudonymizer {
            Pseudonymizer::Null => Value::Null,
            Pseudonymizer::Hash { salt } => {
                Value::String(pseudonym_hash(salt, &value_text(original)))
            }
            Pseudonymizer::Token(store) => match store.tokenize(field, &value_text(original)).await {
                Ok(token) => Value::String(format!("{TOKEN_PREFIX}{token}")),
                Err(e) => {
                    tracing::warn!(error = %e, field, "Tokenization failed, nulling field");
                    Value::Null
                }
            },
        }
    }
}

/// `pseud_` followed by the hex SHA-256 of `salt` concatenated with `value`.
#[must_use]
pub fn pseudonym_hash(salt: &str, value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(value.as_bytes());
    format!("{HASH_PREFIX}{}", hex::encode(hasher.finalize()))
}

/// Text fed to the pseudonymizer: raw for strings, JSON text otherwise.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
