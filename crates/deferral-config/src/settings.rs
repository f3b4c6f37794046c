//! Settings schema shared by deferral.toml and ~/.deferral/config.toml

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Accepted values for `log.level`
pub const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// One configuration layer
///
/// Every field is optional so that layers can be merged; defaults are applied
/// by [`crate::Config`] accessors, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Unwind behaviour
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unwind: Option<UnwindSettings>,

    /// Logging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<LogSettings>,

    /// CLI output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputSettings>,
}

/// `[unwind]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct UnwindSettings {
    /// Convert panics in bodies and deferred actions into failures (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catch_panics: Option<bool>,

    /// Maximum number of pending deferred actions per frame (default: unlimited)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pending: Option<usize>,
}

/// `[log]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LogSettings {
    /// Log level filter (default: "warn")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Forward unwind trace events to the logger (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<bool>,
}

/// `[output]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct OutputSettings {
    /// Output format for CLI reports (default: text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
}

/// CLI report format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    /// Parse a format name as used in environment variables
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let settings: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate field values that the schema alone cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(limit) = self.unwind.as_ref().and_then(|u| u.max_pending) {
            if limit == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "unwind.max_pending".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        if let Some(level) = self.log.as_ref().and_then(|l| l.level.as_deref()) {
            validate_log_level("log.level", level)?;
        }

        Ok(())
    }

    /// Merge another layer into this one
    ///
    /// Values set in `other` win; unset values keep what this layer had.
    pub fn merge(&mut self, other: &Settings) {
        if let Some(theirs) = &other.unwind {
            let ours = self.unwind.get_or_insert_with(Default::default);
            if theirs.catch_panics.is_some() {
                ours.catch_panics = theirs.catch_panics;
            }
            if theirs.max_pending.is_some() {
                ours.max_pending = theirs.max_pending;
            }
        }
        if let Some(theirs) = &other.log {
            let ours = self.log.get_or_insert_with(Default::default);
            if theirs.level.is_some() {
                ours.level = theirs.level.clone();
            }
            if theirs.trace.is_some() {
                ours.trace = theirs.trace;
            }
        }
        if let Some(theirs) = &other.output {
            let ours = self.output.get_or_insert_with(Default::default);
            if theirs.format.is_some() {
                ours.format = theirs.format;
            }
        }
    }

    /// Render as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

/// Validate a log level name
pub(crate) fn validate_log_level(field: &str, value: &str) -> ConfigResult<()> {
    if !LOG_LEVELS.contains(&value.to_lowercase().as_str()) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!(
                "must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                value
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_settings() {
        let toml = r#"
[unwind]
catch_panics = false
max_pending = 64

[log]
level = "debug"
trace = true

[output]
format = "json"
"#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.unwind.as_ref().unwrap().max_pending, Some(64));
        assert_eq!(settings.unwind.as_ref().unwrap().catch_panics, Some(false));
        assert_eq!(
            settings.output.as_ref().unwrap().format,
            Some(OutputFormat::Json)
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
[unwind]
catch_panic = true
"#;
        assert!(toml::from_str::<Settings>(toml).is_err());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let toml = r#"
[output]
format = "yaml"
"#;
        assert!(toml::from_str::<Settings>(toml).is_err());
    }

    #[test]
    fn test_zero_max_pending_invalid() {
        let settings = Settings {
            unwind: Some(UnwindSettings {
                catch_panics: None,
                max_pending: Some(0),
            }),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "unwind.max_pending"
        ));
    }

    #[test]
    fn test_invalid_log_level() {
        let settings = Settings {
            log: Some(LogSettings {
                level: Some("loud".to_string()),
                trace: None,
            }),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_merge_is_field_granular() {
        let mut base = Settings {
            unwind: Some(UnwindSettings {
                catch_panics: Some(false),
                max_pending: Some(8),
            }),
            ..Default::default()
        };
        let overlay = Settings {
            unwind: Some(UnwindSettings {
                catch_panics: None,
                max_pending: Some(32),
            }),
            log: Some(LogSettings {
                level: Some("info".to_string()),
                trace: None,
            }),
            ..Default::default()
        };

        base.merge(&overlay);

        let unwind = base.unwind.unwrap();
        assert_eq!(unwind.catch_panics, Some(false));
        assert_eq!(unwind.max_pending, Some(32));
        assert_eq!(base.log.unwrap().level.as_deref(), Some("info"));
    }

    #[test]
    fn test_to_toml_round_trips_through_parser() {
        let settings = Settings {
            log: Some(LogSettings {
                level: Some("trace".to_string()),
                trace: Some(true),
            }),
            ..Default::default()
        };
        let parsed: Settings = toml::from_str(&settings.to_toml()).unwrap();
        assert_eq!(parsed, settings);
    }
}
