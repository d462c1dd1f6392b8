//! Configuration file management
//!
//! Handles finding, loading, and saving configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Configuration;
use crate::error::ProxyError;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./pod-invoker.yaml",
    "./pod-invoker.yml",
    "./.pod-invoker.yaml",
    "~/.config/pod-invoker/config.yaml",
    "~/.pod-invoker.yaml",
];

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Invoker settings
    #[serde(default)]
    pub pod_invoker: Configuration,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            pod_invoker: Configuration::default(),
        }
    }
}

impl ConfigFile {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self, ProxyError> {
        match Self::find() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProxyError> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::Configuration(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content).map_err(|e| {
                ProxyError::Configuration(format!(
                    "Failed to parse YAML config {}: {e}",
                    path.display()
                ))
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| {
                ProxyError::Configuration(format!(
                    "Failed to parse JSON config {}: {e}",
                    path.display()
                ))
            })?
        };

        config.check_version()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProxyError> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self)
                .map_err(|e| ProxyError::Configuration(format!("Failed to serialize config: {e}")))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| ProxyError::Configuration(format!("Failed to serialize config: {e}")))?
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ProxyError::Configuration(format!(
                        "Failed to create directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        std::fs::write(path, content).map_err(|e| {
            ProxyError::Configuration(format!(
                "Failed to write config file {}: {e}",
                path.display()
            ))
        })
    }

    fn check_version(&self) -> Result<(), ProxyError> {
        if self.version != "1.0" {
            return Err(ProxyError::Configuration(format!(
                "Unsupported config version: {}",
                self.version
            )));
        }
        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        Self {
            version: default_version(),
            pod_invoker: Configuration {
                kubernetes_master: Some("https://master.example.com:8443".to_string()),
                docker_url: Some("registry.example.com:5000".to_string()),
                namespace: "cearq-tests".to_string(),
                username: "developer".to_string(),
                ..Default::default()
            },
        }
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvConfig, RouteMode};
    use tempfile::tempdir;

    #[test]
    fn test_config_file_default() {
        let config = ConfigFile::default();
        assert_eq!(config.version, "1.0");
        assert!(config.pod_invoker.kubernetes_master.is_none());
    }

    #[test]
    fn test_config_file_save_load_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = ConfigFile::example();
        config.save(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.pod_invoker, config.pod_invoker);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "pod_invoker:\n  namespace: cearq-jws\n  route: master\n",
        )
        .unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.version, "1.0");
        assert_eq!(loaded.pod_invoker.namespace, "cearq-jws");
        assert_eq!(loaded.pod_invoker.route, RouteMode::Master);
        assert_eq!(loaded.pod_invoker.pod_port, 8080);
    }

    #[test]
    fn test_json_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"pod_invoker": {"pod_port": 9080}}"#).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.pod_invoker.pod_port, 9080);
    }

    #[test]
    fn test_unsupported_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "version: \"9.0\"\n").unwrap();

        assert!(matches!(
            ConfigFile::load(&path),
            Err(ProxyError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        assert!(Configuration::resolve_with(Some(&missing), &EnvConfig::default()).is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        ConfigFile::example().save(&path).unwrap();

        let env = EnvConfig {
            namespace: Some("from-env".to_string()),
            ..Default::default()
        };
        let config = Configuration::resolve_with(Some(&path), &env).unwrap();

        assert_eq!(config.namespace, "from-env");
        assert_eq!(config.username, "developer");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expand_path() {
        let path = expand_path("./test.yaml");
        assert_eq!(path, PathBuf::from("./test.yaml"));
    }
}
