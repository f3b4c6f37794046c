//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::settings::{
    validate_log_level, LogSettings, OutputFormat, OutputSettings, Settings, UnwindSettings,
};
use crate::{ConfigError, ConfigResult, PROJECT_CONFIG_FILE};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.deferral/config.toml) - lowest priority
/// 2. Project config (./deferral.toml) - overrides global
/// 3. Environment variables (DEFERRAL_*) - overrides project
/// 4. CLI flags - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Effective settings after merging every layer
    pub settings: Settings,

    /// Project root directory (where deferral.toml was found)
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use a specific file as the global configuration layer
    pub fn with_global_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find deferral.toml, then layers it over
    /// the global config and applies environment overrides.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project) = self.find_project_config(start_dir)?;
        self.assemble(project_root, project)
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project = Settings::load_from_file(config_path)?;
        let project_root = config_path.parent().map(|p| p.to_path_buf());
        self.assemble(project_root, project)
    }

    fn assemble(&mut self, project_root: Option<PathBuf>, project: Settings) -> ConfigResult<Config> {
        let mut settings = self.load_global_config()?.settings;
        settings.merge(&project);
        apply_env_overrides(&mut settings, |var| env::var(var).ok())?;

        Ok(Config {
            settings,
            project_root,
        })
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (project_root, settings); an empty layer when no file exists.
    fn find_project_config(&self, start_dir: &Path) -> ConfigResult<(Option<PathBuf>, Settings)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                let settings = Settings::load_from_file(&config_path)?;
                return Ok((Some(current), settings));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, Settings::default())),
            }
        }
    }

    /// Load global configuration from ~/.deferral/config.toml
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => match GlobalConfig::global_config_path() {
                Ok(path) => {
                    self.global_config_path = Some(path.clone());
                    path
                }
                // No home directory: there is simply no global layer
                Err(ConfigError::HomeNotFound) => return Ok(GlobalConfig::default()),
                Err(e) => return Err(e),
            },
        };

        GlobalConfig::load_optional(&path)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply environment variable overrides to a settings layer
///
/// Recognised variables: DEFERRAL_CATCH_PANICS, DEFERRAL_MAX_PENDING,
/// DEFERRAL_LOG, DEFERRAL_TRACE, DEFERRAL_FORMAT.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let mut overlay = Settings::default();

    if let Some(value) = lookup("DEFERRAL_CATCH_PANICS") {
        overlay
            .unwind
            .get_or_insert_with(UnwindSettings::default)
            .catch_panics = Some(parse_bool("DEFERRAL_CATCH_PANICS", &value)?);
    }

    if let Some(value) = lookup("DEFERRAL_MAX_PENDING") {
        let limit = value
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ConfigError::InvalidEnv {
                var: "DEFERRAL_MAX_PENDING".to_string(),
                value: value.clone(),
                reason: "expected a positive integer".to_string(),
            })?;
        overlay
            .unwind
            .get_or_insert_with(UnwindSettings::default)
            .max_pending = Some(limit);
    }

    if let Some(value) = lookup("DEFERRAL_LOG") {
        validate_log_level("DEFERRAL_LOG", &value)?;
        overlay.log.get_or_insert_with(LogSettings::default).level = Some(value.to_lowercase());
    }

    if let Some(value) = lookup("DEFERRAL_TRACE") {
        overlay.log.get_or_insert_with(LogSettings::default).trace =
            Some(parse_bool("DEFERRAL_TRACE", &value)?);
    }

    if let Some(value) = lookup("DEFERRAL_FORMAT") {
        let format = OutputFormat::parse(&value).ok_or_else(|| ConfigError::InvalidEnv {
            var: "DEFERRAL_FORMAT".to_string(),
            value: value.clone(),
            reason: "expected 'text' or 'json'".to_string(),
        })?;
        overlay.output.get_or_insert_with(OutputSettings::default).format = Some(format);
    }

    settings.merge(&overlay);
    Ok(())
}

fn parse_bool(var: &str, value: &str) -> ConfigResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

impl Config {
    /// Whether panics are converted into failures (default: true)
    pub fn catch_panics(&self) -> bool {
        self.settings
            .unwind
            .as_ref()
            .and_then(|u| u.catch_panics)
            .unwrap_or(true)
    }

    /// Per-frame pending action limit (default: unlimited)
    pub fn max_pending(&self) -> Option<usize> {
        self.settings.unwind.as_ref().and_then(|u| u.max_pending)
    }

    /// Effective log level (default: "warn")
    pub fn log_level(&self) -> &str {
        self.settings
            .log
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("warn")
    }

    /// Whether unwind events are forwarded to the logger (default: false)
    pub fn trace_enabled(&self) -> bool {
        self.settings
            .log
            .as_ref()
            .and_then(|l| l.trace)
            .unwrap_or(false)
    }

    /// Effective output format (default: text)
    pub fn output_format(&self) -> OutputFormat {
        self.settings
            .output
            .as_ref()
            .and_then(|o| o.format)
            .unwrap_or_default()
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if this is a project (has deferral.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}
