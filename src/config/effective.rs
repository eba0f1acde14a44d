//! Effective configuration with provenance
//!
//! The effective config captures the merged configuration plus information
//! about where each contributing file came from, digested for provenance.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use pybundle_options::{BundleMode, ConsoleMode};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;

/// Schema version for the effective config
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "pybundle/effective_config@1";

/// Errors from configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid TOML in {path}: {message}")]
    Parse { path: String, message: String },
}

/// Origin of a configuration source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    User,
    Project,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Origin of this source
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Merged configuration with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// The merged configuration object
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Build the effective config from layers.
    ///
    /// Missing files are skipped silently; a present-but-invalid file is an
    /// error.
    pub fn build(
        user_config_path: Option<&Path>,
        project_config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();

        // Layer 1: built-in defaults
        layers.push(BuiltinDefaults::default().to_value());
        sources.push(ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        });

        // Layer 2: user config
        if let Some(path) = user_config_path {
            if path.exists() {
                let (value, digest) = load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::User,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        // Layer 3: project config
        if let Some(path) = project_config_path {
            if path.exists() {
                let (value, digest) = load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::Project,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        // Layer 4: CLI overrides
        if let Some(overrides) = cli_overrides {
            layers.push(overrides);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            config: merge_layers(layers),
            sources,
        })
    }

    /// The configured interpreter
    pub fn python(&self) -> String {
        self.config["python"]
            .as_str()
            .unwrap_or("python3")
            .to_string()
    }

    /// Grace period between SIGTERM and SIGKILL on cancel
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.config["grace_seconds"].as_u64().unwrap_or(5))
    }

    /// Timeout for interpreter probe subprocesses
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.config["probe_timeout_ms"].as_u64().unwrap_or(3000))
    }

    /// Configured bundle layout
    pub fn bundle_mode(&self) -> BundleMode {
        match self.config["bundle"]["mode"].as_str() {
            Some("onefile") => BundleMode::OneFile,
            _ => BundleMode::OneDir,
        }
    }

    /// Configured console mode
    pub fn console_mode(&self) -> ConsoleMode {
        match self.config["bundle"]["console"].as_str() {
            Some("windowed") => ConsoleMode::Windowed,
            _ => ConsoleMode::Console,
        }
    }

    /// Whether to clean PyInstaller's cache before building
    pub fn clean(&self) -> bool {
        self.config["bundle"]["clean"].as_bool().unwrap_or(false)
    }
}

/// Default user config path: ~/.config/pybundle/config.toml
pub fn user_config_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config/pybundle/config.toml"))
}

/// Project config path: pybundle.toml in the given directory
pub fn project_config_path(dir: &Path) -> PathBuf {
    dir.join("pybundle.toml")
}

/// Load a TOML file as a JSON value plus the SHA-256 digest of its bytes
fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    })?;

    let digest = hex::encode(Sha256::digest(&bytes));

    let text = String::from_utf8_lossy(&bytes);
    let toml_value: toml::Value = toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_string_lossy().to_string(),
        message: e.to_string(),
    })?;

    let value = serde_json::to_value(toml_value).map_err(|e| ConfigError::Parse {
        path: path.to_string_lossy().to_string(),
        message: e.to_string(),
    })?;

    Ok((value, digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_builtin_only() {
        let config = EffectiveConfig::build(None, None, None).unwrap();

        assert_eq!(config.python(), "python3");
        assert_eq!(config.grace_period(), Duration::from_secs(5));
        assert_eq!(config.bundle_mode(), BundleMode::OneDir);
        assert_eq!(config.console_mode(), ConsoleMode::Console);
        assert!(!config.clean());
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].origin, ConfigOrigin::Builtin);
    }

    #[test]
    fn test_project_config_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pybundle.toml");
        fs::write(&path, "python = \"/opt/venv/bin/python\"\n\n[bundle]\nmode = \"onefile\"\n").unwrap();

        let config = EffectiveConfig::build(None, Some(&path), None).unwrap();

        assert_eq!(config.python(), "/opt/venv/bin/python");
        assert_eq!(config.bundle_mode(), BundleMode::OneFile);
        // untouched keys keep their defaults
        assert_eq!(config.console_mode(), ConsoleMode::Console);

        let project = &config.sources[1];
        assert_eq!(project.origin, ConfigOrigin::Project);
        assert!(project.path.is_some());
        assert_eq!(project.digest.as_ref().unwrap().len(), 64);
    }

    #[test]
    fn test_cli_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pybundle.toml");
        fs::write(&path, "python = \"/opt/venv/bin/python\"\n").unwrap();

        let overrides = json!({"python": "/usr/bin/python3.12"});
        let config = EffectiveConfig::build(None, Some(&path), Some(overrides)).unwrap();

        assert_eq!(config.python(), "/usr/bin/python3.12");
        assert_eq!(config.sources.last().unwrap().origin, ConfigOrigin::Cli);
    }

    #[test]
    fn test_missing_files_skipped() {
        let config = EffectiveConfig::build(
            Some(Path::new("/no/such/user.toml")),
            Some(Path::new("/no/such/pybundle.toml")),
            None,
        )
        .unwrap();

        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pybundle.toml");
        fs::write(&path, "not [valid toml").unwrap();

        let result = EffectiveConfig::build(None, Some(&path), None);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
