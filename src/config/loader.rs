//! Locating and parsing the governance config file.

use std::path::{Path, PathBuf};

use super::types::GovernanceConfig;

/// Project-local config file name.
pub const LOCAL_CONFIG_FILE: &str = ".survgov.toml";

/// Directory under the user config dir.
const APP_DIR: &str = "surveillance-governance";

/// Failure to read or parse a config file that exists.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Resolves [`GovernanceConfig`] from the first config file found.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    candidates: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Look in `./.survgov.toml`, then `<config dir>/surveillance-governance/config.toml`.
    #[must_use]
    pub fn new() -> Self {
        let user = dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"));
        Self {
            candidates: std::iter::once(PathBuf::from(LOCAL_CONFIG_FILE))
                .chain(user)
                .collect(),
        }
    }

    /// Only consider `path`.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            candidates: vec![path.into()],
        }
    }

    /// Candidate files, highest priority first.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// The candidate that will be loaded, if any exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<&Path> {
        self.candidates
            .iter()
            .map(PathBuf::as_path)
            .find(|p| p.is_file())
    }

    /// Parse the first existing candidate. With none, defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed.
    pub fn load(&self) -> Result<GovernanceConfig, ConfigError> {
        match self.find_config_file() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading governance config");
                parse_file(path)
            }
            None => {
                tracing::debug!(candidates = self.candidates.len(), "No config file, using defaults");
                Ok(GovernanceConfig::default())
            }
        }
    }

    /// [`load`](Self::load), then overlay the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed.
    pub fn load_with_env(&self) -> Result<GovernanceConfig, ConfigError> {
        let mut config = self.load()?;
        config.apply_env();
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_file(path: &Path) -> Result<GovernanceConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PseudonymMode;

    #[test]
    fn test_config_loader_default_paths() {
        let loader = ConfigLoader::new();
        assert!(!loader.search_paths().is_empty());
        assert!(loader.search_paths()[0].ends_with(LOCAL_CONFIG_FILE));
    }

    #[test]
    fn test_config_loader_returns_defaults_when_no_file() {
        let loader = ConfigLoader::with_path(PathBuf::from("/nonexistent/path.toml"));
        let config = loader.load().unwrap();
        assert_eq!(config, GovernanceConfig::default());
        assert!(loader.find_config_file().is_none());
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_str = r#"
            enabled = false
            sensitive_fields = ["cpf", "cs_sexo"]

            [pseudonymize]
            enabled = true
            mode = "token"

            [rotation]
            max_lines = 100

            [archive]
            bucket = "srag-audit"

            [paths]
            audit_log = "/tmp/gov/audit.log"
        "#;

        let config: GovernanceConfig = toml::from_str(toml_str).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.sensitive_fields, vec!["cpf", "cs_sexo"]);
        assert!(config.pseudonymize.enabled);
        assert_eq!(config.pseudonymize.mode, PseudonymMode::Token);
        assert_eq!(config.rotation.max_lines, 100);
        assert_eq!(config.rotation.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.archive.bucket.as_deref(), Some("srag-audit"));
        assert_eq!(config.archive.prefix, "audit/");
        assert_eq!(config.paths.audit_log, PathBuf::from("/tmp/gov/audit.log"));
        assert_eq!(config.paths.decisions, PathBuf::from("reports/decisions.jsonl"));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "sensitive_fields = [\"nome\"]\n").unwrap();

        let loader = ConfigLoader::with_path(path.clone());
        assert_eq!(loader.find_config_file(), Some(path.as_path()));

        let config = loader.load().unwrap();
        assert_eq!(config.sensitive_fields, vec!["nome"]);
    }

    #[test]
    fn test_load_invalid_file_is_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "enabled = \"sometimes\"\n").unwrap();

        let err = ConfigLoader::with_path(path).load().unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_directory_candidate_is_skipped() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let loader = ConfigLoader::with_path(temp_dir.path());

        assert!(loader.find_config_file().is_none());
        assert_eq!(loader.load().unwrap(), GovernanceConfig::default());
    }
}
