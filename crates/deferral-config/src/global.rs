//! Global Configuration (~/.deferral/config.toml)
//!
//! Handles user-level configuration stored in `~/.deferral/config.toml`.
//! It uses the same schema as a project's `deferral.toml` and sits below it
//! in precedence.

use crate::settings::Settings;
use crate::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.deferral/config.toml
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlobalConfig {
    /// Settings layer read from the file
    pub settings: Settings,

    /// File the settings came from, if one existed
    pub path: Option<PathBuf>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        Ok(Self {
            settings: Settings::load_from_file(path)?,
            path: Some(path.to_path_buf()),
        })
    }

    /// Load from `path` if it exists, otherwise return an empty layer
    pub fn load_optional(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Get the global configuration directory (~/.deferral)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".deferral"))
    }

    /// Get the global config file path (~/.deferral/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        Ok(Self::global_config_dir()?.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_global_config_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let config = GlobalConfig::load_optional(&temp_dir.path().join("config.toml")).unwrap();

        assert_eq!(config, GlobalConfig::default());
    }

    #[test]
    fn test_load_global_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[log]
level = "info"
"#,
        )
        .unwrap();

        let config = GlobalConfig::load_optional(&path).unwrap();
        assert_eq!(config.path.as_deref(), Some(path.as_path()));
        assert_eq!(
            config.settings.log.unwrap().level.as_deref(),
            Some("info")
        );
    }

    #[test]
    fn test_invalid_global_config_reports_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[unwind\n").unwrap();

        match GlobalConfig::load_from_file(&path) {
            Err(ConfigError::TomlParseError { file, .. }) => assert_eq!(file, path),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_global_config_path_under_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                GlobalConfig::global_config_path().unwrap(),
                home.join(".deferral").join("config.toml")
            );
        }
    }
}
