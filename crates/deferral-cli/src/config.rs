//! CLI configuration
//!
//! Resolves the effective deferral configuration for a command and the
//! few presentation switches that only the CLI cares about.

use anyhow::{Context, Result};
use deferral_config::{Config, ConfigLoader};
use std::env;
use std::path::Path;

/// Load the effective configuration
///
/// An explicit `--config` file replaces the search for `deferral.toml`;
/// otherwise the search starts at the current directory. The global layer and
/// `DEFERRAL_*` overrides apply either way.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let mut loader = ConfigLoader::new();
    match explicit {
        Some(path) => loader
            .load_from_file(path)
            .with_context(|| format!("Failed to load config file: {}", path.display())),
        None => {
            let cwd = env::current_dir().context("Failed to read current directory")?;
            loader
                .load_from_directory(&cwd)
                .context("Failed to load configuration")
        }
    }
}

/// Colour is off when NO_COLOR or DEFERRAL_NO_COLOR is set
pub fn no_color() -> bool {
    env::var_os("NO_COLOR").is_some() || env::var_os("DEFERRAL_NO_COLOR").is_some()
}

/// Log filter for `-v` repetitions; `None` leaves the configured level alone
pub fn verbosity_filter(verbose: u8) -> Option<log::LevelFilter> {
    match verbose {
        0 => None,
        1 => Some(log::LevelFilter::Info),
        2 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_verbosity_filter() {
        assert_eq!(verbosity_filter(0), None);
        assert_eq!(verbosity_filter(1), Some(log::LevelFilter::Info));
        assert_eq!(verbosity_filter(2), Some(log::LevelFilter::Debug));
        assert_eq!(verbosity_filter(9), Some(log::LevelFilter::Trace));
    }

    #[test]
    #[serial]
    fn test_no_color_env() {
        env::remove_var("NO_COLOR");
        env::remove_var("DEFERRAL_NO_COLOR");
        assert!(!no_color());

        env::set_var("DEFERRAL_NO_COLOR", "1");
        assert!(no_color());
        env::remove_var("DEFERRAL_NO_COLOR");
    }

    #[test]
    #[serial]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[unwind]\nmax_pending = 3\n").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.max_pending(), Some(3));
    }

    #[test]
    #[serial]
    fn test_load_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load config file"));
    }
}
