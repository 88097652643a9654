//! Bridge configuration: where outputs are staged and which domain sets drive
//! classification.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cmdbridge_util::expand_tilde;
use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::DomainSets;

/// Environment variable allowing callers to override the configuration path.
pub const CONFIG_PATH_ENV: &str = "CMDBRIDGE_CONFIG_PATH";

/// Default filename for the JSON configuration.
pub const CONFIG_FILE_NAME: &str = "bridge.json";

/// Error surfaced when reading or writing configuration fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Root under which commands write their outputs (`{staging_root}/web/...`)
    #[serde(default = "default_staging_root")]
    pub staging_root: PathBuf,
    /// Public static directory; downloads are staged in `{static_root}/tmp`
    #[serde(default = "default_static_root")]
    pub static_root: PathBuf,
    /// Directory holding the request history logs
    #[serde(default = "default_history_root")]
    pub history_root: PathBuf,
    /// Replaces the embedded object-class names when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_classes: Option<Vec<String>>,
    /// Replaces the embedded status-provider names when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_providers: Option<Vec<String>>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            staging_root: default_staging_root(),
            static_root: default_static_root(),
            history_root: default_history_root(),
            object_classes: None,
            status_providers: None,
        }
    }
}

impl BridgeConfig {
    /// Loads configuration from [`default_config_path`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_config_path())
    }

    /// Loads configuration from `path`.
    ///
    /// A missing file yields the defaults; an unparsable file is logged and
    /// also yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => Ok(config),
                Err(error) => {
                    warn!(
                        path = %path.display(),
                        error = %error,
                        "Failed to parse bridge config; using defaults"
                    );
                    Ok(Self::default())
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(ConfigError::Io(error)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Domain sets to inject into the classifier.
    pub fn domain_sets(&self) -> DomainSets {
        match (&self.object_classes, &self.status_providers) {
            (None, None) => DomainSets::embedded(),
            (object_classes, status_providers) => {
                let embedded = DomainSets::embedded();
                DomainSets::new(
                    object_classes
                        .clone()
                        .unwrap_or_else(|| embedded.object_classes().to_vec()),
                    status_providers
                        .clone()
                        .unwrap_or_else(|| embedded.status_providers().to_vec()),
                )
            }
        }
    }
}

/// Get the default path for the bridge configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cmdbridge")
        .join(CONFIG_FILE_NAME)
}

fn default_staging_root() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_static_root() -> PathBuf {
    PathBuf::from("var").join("www").join("static")
}

fn default_history_root() -> PathBuf {
    default_static_root().join("tmp").join("request_history")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = BridgeConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.staging_root, PathBuf::from("tmp"));
        assert_eq!(config.static_root, PathBuf::from("var/www/static"));
    }

    #[test]
    fn invalid_json_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(BridgeConfig::load_from(&path).unwrap(), BridgeConfig::default());
    }

    #[test]
    fn save_then_load_preserves_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("bridge.json");
        let config = BridgeConfig {
            staging_root: dir.path().join("staging"),
            object_classes: Some(vec!["Domain".into(), "XMLManager".into()]),
            ..BridgeConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = BridgeConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        let domains = loaded.domain_sets();
        assert!(domains.is_object_class("XMLManager"));
        assert!(!domains.is_object_class("CryptoCertificate"));
        assert!(domains.is_status_provider("CPUUsage"));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        fs::write(&path, r#"{"static_root": "/srv/static"}"#).unwrap();
        let config = BridgeConfig::load_from(&path).unwrap();
        assert_eq!(config.static_root, PathBuf::from("/srv/static"));
        assert_eq!(config.staging_root, PathBuf::from("tmp"));
    }

    #[test]
    fn default_path_honors_env_override() {
        let override_path = "~/custom/bridge.json";
        temp_env::with_var(CONFIG_PATH_ENV, Some(override_path), || {
            assert_eq!(default_config_path(), expand_tilde(override_path));
        });
    }
}
