//! List command - show the built-in scenarios

use anyhow::{Context, Result};
use colored::*;
use deferral_runtime::Scenario;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ScenarioInfo {
    name: &'static str,
    summary: &'static str,
}

pub fn run(json: bool) -> Result<()> {
    if json {
        let infos: Vec<ScenarioInfo> = Scenario::ALL
            .iter()
            .map(|s| ScenarioInfo {
                name: s.name(),
                summary: s.summary(),
            })
            .collect();
        let out = serde_json::to_string_pretty(&infos).context("Failed to encode scenario list")?;
        println!("{}", out);
    } else {
        print!("{}", render_text());
    }
    Ok(())
}

fn render_text() -> String {
    let width = Scenario::ALL
        .iter()
        .map(|s| s.name().len())
        .max()
        .unwrap_or(0);
    Scenario::ALL
        .iter()
        .map(|s| {
            let name = format!("{:<width$}", s.name(), width = width);
            format!("{}  {}\n", name.bold(), s.summary())
        })
        .collect()
}
