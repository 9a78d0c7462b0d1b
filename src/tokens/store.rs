//! JSON-backed token store with in-memory forward and reverse indexes.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::error::TokenStoreError;

/// Random bytes per token, 32 URL-safe characters once encoded.
const TOKEN_BYTES: usize = 24;

/// Separator between field and value in store keys.
const KEY_SEPARATOR: char = ':';

#[derive(Debug, Default)]
struct TokenIndex {
    /// `field:value` to token. Ordered so the document is stable on disk.
    forward: BTreeMap<String, String>,
    /// Token to `field:value`.
    reverse: HashMap<String, String>,
}

impl TokenIndex {
    fn from_forward(forward: BTreeMap<String, String>) -> Self {
        let reverse = forward
            .iter()
            .map(|(key, token)| (token.clone(), key.clone()))
            .collect();
        Self { forward, reverse }
    }

    fn insert(&mut self, key: String, token: String) {
        self.reverse.insert(token.clone(), key.clone());
        self.forward.insert(key, token);
    }

    fn remove(&mut self, key: &str) {
        if let Some(token) = self.forward.remove(key) {
            self.reverse.remove(&token);
        }
    }
}

/// Durable `(field, value)` to token mapping.
///
/// Clones share the same index. All mutations go through one lock and are
/// written to disk before the lock is released, so concurrent callers never
/// lose each other's assignments.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
    index: Arc<Mutex<TokenIndex>>,
}

impl TokenStore {
    /// Open the store at `path`.
    ///
    /// A missing file is an empty store. A corrupt or unreadable file is also
    /// treated as empty and gets replaced on the next assignment.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let forward = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(forward) => {
                    tracing::debug!(count = forward.len(), "Loaded token store");
                    forward
                }
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "Corrupt token store, starting fresh");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No token store found");
                BTreeMap::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Failed to read token store");
                BTreeMap::new()
            }
        };

        Self {
            path,
            index: Arc::new(Mutex::new(TokenIndex::from_forward(forward))),
        }
    }

    /// Path of the store document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of assigned tokens.
    pub async fn len(&self) -> usize {
        self.index.lock().await.forward.len()
    }

    /// Whether no token has been assigned yet.
    pub async fn is_empty(&self) -> bool {
        self.index.lock().await.forward.is_empty()
    }

    /// Return the token for `(field, value)`, assigning one on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if a new assignment cannot be persisted. The
    /// assignment is then discarded, so memory never runs ahead of disk.
    pub async fn tokenize(&self, field: &str, value: &str) -> Result<String, TokenStoreError> {
        let key = store_key(field, value);
        let mut index = self.index.lock().await;

        if let Some(token) = index.forward.get(&key) {
            return Ok(token.clone());
        }

        let token = loop {
            let candidate = generate_token();
            if !index.reverse.contains_key(&candidate) {
                break candidate;
            }
        };

        index.insert(key.clone(), token.clone());
        if let Err(e) = self.persist(&index).await {
            index.remove(&key);
            return Err(e);
        }

        tracing::debug!(field, count = index.forward.len(), "Assigned new token");
        Ok(token)
    }

    /// Return the original value behind `token`, if the store knows it.
    ///
    /// Lookup is by token alone. `field` is used to split the stored key, so
    /// field names containing `:` still yield the right value.
    pub async fn detokenize(&self, field: &str, token: &str) -> Option<String> {
        let index = self.index.lock().await;
        let value = index
            .reverse
            .get(token)
            .and_then(|key| value_of(key, field))
            .map(str::to_string);

        if value.is_none() {
            tracing::debug!(field, "Token not found");
        }
        value
    }

    /// Write the whole document atomically (temp file + sync + rename).
    async fn persist(&self, index: &TokenIndex) -> Result<(), TokenStoreError> {
        let persist_err = |source| TokenStoreError::Persist {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(persist_err)?;
            }
        }

        let json = serde_json::to_string_pretty(&index.forward)?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(persist_err)?;
        file.write_all(json.as_bytes()).await.map_err(persist_err)?;
        file.sync_data().await.map_err(persist_err)?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(persist_err)
    }
}

/// Store key for a pair.
///
/// Known limitation: the key is not injective when field or value contain
/// `:`, so `("a:b", "c")` and `("a", "b:c")` share one token.
fn store_key(field: &str, value: &str) -> String {
    format!("{field}{KEY_SEPARATOR}{value}")
}

/// Value part of a stored key, preferring the caller's field as the prefix.
fn value_of<'a>(key: &'a str, field: &str) -> Option<&'a str> {
    key.strip_prefix(field)
        .and_then(|rest| rest.strip_prefix(KEY_SEPARATOR))
        .or_else(|| key.split_once(KEY_SEPARATOR).map(|(_, value)| value))
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
