//! Fix configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via NEEDLEFIX_CONFIG or --config)
//! 3. Environment variables
//! 4. Command-line flags (applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a YAML config file.
pub const CONFIG_ENV: &str = "NEEDLEFIX_CONFIG";

/// Batch fix configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixConfig {
    /// Stop the batch at the first volume that fails to rebuild.
    /// Remaining volumes are reported as not attempted.
    pub fail_fast: bool,
    /// Fsync each index file before reporting it rebuilt.
    pub fsync: bool,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            fsync: true,
        }
    }
}

impl FixConfig {
    /// Loads configuration from the file named by NEEDLEFIX_CONFIG, if any,
    /// then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: FixConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Applies NEEDLEFIX_* environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("NEEDLEFIX_FAIL_FAST") {
            if let Some(flag) = parse_flag(&value) {
                self.fail_fast = flag;
            }
        }

        if let Ok(value) = std::env::var("NEEDLEFIX_FSYNC") {
            if let Some(flag) = parse_flag(&value) {
                self.fsync = flag;
            }
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = FixConfig::default();
        assert!(!config.fail_fast);
        assert!(config.fsync);
    }

    #[test]
    fn test_from_file_partial() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("needlefix.yaml");
        std::fs::write(&path, "fail_fast: true\n").unwrap();

        let config = FixConfig::from_file(&path).unwrap();
        assert!(config.fail_fast);
        assert!(config.fsync);
    }

    #[test]
    fn test_from_file_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            FixConfig::from_file(&missing),
            Err(ConfigError::IoError(..))
        ));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "fsync: [not, a, bool]\n").unwrap();
        assert!(matches!(
            FixConfig::from_file(&bad),
            Err(ConfigError::ParseError(..))
        ));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = FixConfig {
            fail_fast: true,
            fsync: false,
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: FixConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
