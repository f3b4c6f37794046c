//! Deferral Configuration System
//!
//! Provides configuration management for the deferral runtime and CLI:
//! - Project configuration (deferral.toml)
//! - Global user configuration (~/.deferral/config.toml)
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.deferral/config.toml)
//! 2. Project config (./deferral.toml, searched upwards)
//! 3. Environment variables (DEFERRAL_*)
//! 4. CLI flags
//!
//! # Example
//!
//! ```no_run
//! use deferral_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! assert!(config.catch_panics());
//! ```

pub mod global;
pub mod loader;
pub mod settings;

use std::path::PathBuf;
use thiserror::Error;

/// Name of the project configuration file
pub const PROJECT_CONFIG_FILE: &str = "deferral.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid environment override {var}={value}: {reason}")]
    InvalidEnv {
        var: String,
        value: String,
        reason: String,
    },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader};
pub use settings::{LogSettings, OutputFormat, OutputSettings, Settings, UnwindSettings};
