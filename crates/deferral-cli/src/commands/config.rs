//! Config command - print the effective configuration

use anyhow::{Context, Result};
use deferral_config::{Config, LogSettings, OutputSettings, Settings, UnwindSettings};

/// Every setting resolved to the value in effect, defaults included
pub fn effective(config: &Config) -> Settings {
    Settings {
        unwind: Some(UnwindSettings {
            catch_panics: Some(config.catch_panics()),
            max_pending: config.max_pending(),
        }),
        log: Some(LogSettings {
            level: Some(config.log_level().to_string()),
            trace: Some(config.trace_enabled()),
        }),
        output: Some(OutputSettings {
            format: Some(config.output_format()),
        }),
    }
}

pub fn run(config: &Config, json: bool) -> Result<()> {
    let settings = effective(config);
    if json {
        let value = serde_json::json!({
            "project_root": config.project_root().map(|p| p.display().to_string()),
            "settings": settings,
        });
        let out = serde_json::to_string_pretty(&value).context("Failed to encode configuration")?;
        println!("{}", out);
    } else {
        match config.project_root() {
            Some(root) => println!("# project: {}", root.display()),
            None => println!("# no deferral.toml found"),
        }
        print!("{}", settings.to_toml());
    }
    Ok(())
}
