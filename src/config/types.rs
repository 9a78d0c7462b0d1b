//! Configuration types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default rotation threshold in lines.
pub const DEFAULT_MAX_LINES: usize = 5000;

/// Default rotation threshold in bytes (5 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// How sensitive values are replaced when pseudonymization is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PseudonymMode {
    /// Salted SHA-256, one-way.
    #[default]
    Hash,
    /// Random token from the token store, reversible.
    Token,
    /// Replace with null. Any unrecognized mode falls back here.
    Null,
}

impl PseudonymMode {
    /// Returns the configuration string for this mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Token => "token",
            Self::Null => "null",
        }
    }
}

impl FromStr for PseudonymMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "hash" => Self::Hash,
            "token" => Self::Token,
            "null" | "none" => Self::Null,
            other => {
                tracing::warn!(mode = other, "Unknown pseudonymization mode, using null marker");
                Self::Null
            }
        })
    }
}

impl From<String> for PseudonymMode {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Self::Null)
    }
}

impl From<PseudonymMode> for String {
    fn from(mode: PseudonymMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for PseudonymMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pseudonymization settings for sensitive fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PseudonymizeConfig {
    /// When false, sensitive fields are always nulled.
    pub enabled: bool,
    /// Replacement strategy when enabled.
    pub mode: PseudonymMode,
    /// Salt prepended to values before hashing.
    pub salt: String,
}

impl Default for PseudonymizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: PseudonymMode::Hash,
            salt: String::new(),
        }
    }
}

impl PseudonymizeConfig {
    /// The mode that actually applies, taking `enabled` into account.
    #[must_use]
    pub fn effective_mode(&self) -> PseudonymMode {
        if self.enabled {
            self.mode
        } else {
            PseudonymMode::Null
        }
    }
}

/// Audit log rotation thresholds. Zero disables the corresponding pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Keep at most this many lines in the active log.
    pub max_lines: usize,
    /// Archive the active log once it grows past this many bytes.
    pub max_bytes: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl RotationConfig {
    /// Rotation with both passes turned off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_lines: 0,
            max_bytes: 0,
        }
    }
}

/// Remote archive target for rotated audit logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Bucket to upload rotated logs to. `None` keeps archives local only.
    pub bucket: Option<String>,
    /// Key prefix, concatenated verbatim with the archive file name.
    pub prefix: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            prefix: "audit/".to_string(),
        }
    }
}

/// Filesystem locations of governance state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub audit_log: PathBuf,
    pub decisions: PathBuf,
    pub archive_dir: PathBuf,
    pub token_store: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            audit_log: PathBuf::from("reports/audit.log"),
            decisions: PathBuf::from("reports/decisions.jsonl"),
            archive_dir: PathBuf::from("reports/archive"),
            token_store: PathBuf::from("data/tokens.json"),
        }
    }
}

impl PathsConfig {
    /// All paths placed under a single root directory.
    #[must_use]
    pub fn under(root: &std::path::Path) -> Self {
        Self {
            audit_log: root.join("audit.log"),
            decisions: root.join("decisions.jsonl"),
            archive_dir: root.join("archive"),
            token_store: root.join("tokens.json"),
        }
    }
}

/// Top-level governance configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Gates audit and decision writes. Redaction and guardrails always run.
    pub enabled: bool,
    /// Field names treated as sensitive by the redactor.
    pub sensitive_fields: Vec<String>,
    pub pseudonymize: PseudonymizeConfig,
    pub rotation: RotationConfig,
    pub archive: ArchiveConfig,
    pub paths: PathsConfig,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sensitive_fields: vec!["nu_idade_n".to_string(), "cs_sexo".to_string()],
            pseudonymize: PseudonymizeConfig::default(),
            rotation: RotationConfig::default(),
            archive: ArchiveConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl GovernanceConfig {
    /// Default configuration with all state kept under `root`.
    #[must_use]
    pub fn rooted_at(root: &std::path::Path) -> Self {
        Self {
            paths: PathsConfig::under(root),
            ..Self::default()
        }
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary variable lookup.
    ///
    /// Unset variables leave the current value untouched.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GOVERNANCE_ENABLED") {
            self.enabled = parse_flag(&v);
        }
        if let Some(v) = lookup("SENSITIVE_FIELDS") {
            self.sensitive_fields = v
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("PSEUDONYMIZE_ENABLED") {
            self.pseudonymize.enabled = parse_flag(&v);
        }
        if let Some(v) = lookup("PSEUDONYMIZE_SALT") {
            self.pseudonymize.salt = v;
        }
        if let Some(v) = lookup("PSEUDONYMIZE_MODE") {
            self.pseudonymize.mode = PseudonymMode::from(v);
        }
        if let Some(v) = lookup("AUDIT_MAX_LINES") {
            parse_number("AUDIT_MAX_LINES", &v, &mut self.rotation.max_lines);
        }
        if let Some(v) = lookup("AUDIT_MAX_BYTES") {
            parse_number("AUDIT_MAX_BYTES", &v, &mut self.rotation.max_bytes);
        }
        if let Some(v) = lookup("S3_ARCHIVE_BUCKET") {
            let v = v.trim();
            self.archive.bucket = (!v.is_empty()).then(|| v.to_string());
        }
        if let Some(v) = lookup("S3_ARCHIVE_PREFIX") {
            self.archive.prefix = v;
        }
        if let Some(v) = lookup("AUDIT_LOG_PATH") {
            self.paths.audit_log = PathBuf::from(v);
        }
        if let Some(v) = lookup("DECISIONS_PATH") {
            self.paths.decisions = PathBuf::from(v);
        }
        if let Some(v) = lookup("ARCHIVE_DIR") {
            self.paths.archive_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("TOKEN_STORE_PATH") {
            self.paths.token_store = PathBuf::from(v);
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn parse_number<T: FromStr>(name: &str, value: &str, target: &mut T) {
    match value.trim().parse() {
        Ok(parsed) => *target = parsed,
        Err(_) => {
            tracing::warn!(variable = name, value, "Ignoring non-numeric setting");
        }
    }
}
