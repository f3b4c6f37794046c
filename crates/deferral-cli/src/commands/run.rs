//! Run command - execute built-in scenarios

use anyhow::{bail, Context, Result};
use colored::*;
use deferral_config::{Config, OutputFormat};
use deferral_runtime::{Runtime, Scenario, ScenarioReport};

/// Arguments for `deferral run`
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    /// Scenario names, in the order to run them
    pub scenarios: Vec<String>,
    /// Run every scenario
    pub all: bool,
    /// Force JSON output
    pub json: bool,
}

/// Run the selected scenarios and print their reports
///
/// A scenario that ends in a failure still counts as a successful run; the
/// failure is part of its report.
pub fn run(args: RunArgs, config: &Config) -> Result<()> {
    let selected = select(&args.scenarios, args.all)?;
    let runtime = Runtime::from_config(config);

    let reports: Vec<ScenarioReport> = selected
        .iter()
        .map(|scenario| {
            log::info!("running scenario '{}'", scenario);
            scenario.run(&runtime)
        })
        .collect();

    if args.json || config.output_format() == OutputFormat::Json {
        let json = serde_json::to_string_pretty(&reports).context("Failed to encode reports")?;
        println!("{}", json);
    } else {
        for report in &reports {
            print!("{}", render_text(report));
        }
    }
    Ok(())
}

/// Resolve scenario names; every name is checked before anything runs
pub fn select(names: &[String], all: bool) -> Result<Vec<Scenario>> {
    if all {
        return Ok(Scenario::ALL.to_vec());
    }
    if names.is_empty() {
        bail!("No scenario given. Pass one or more names, or --all (see `deferral list`)");
    }
    names
        .iter()
        .map(|name| name.parse::<Scenario>().map_err(anyhow::Error::from))
        .collect()
}

/// Human-readable report
pub fn render_text(report: &ScenarioReport) -> String {
    let mut out = format!("{}\n", report.name.cyan().bold());
    for line in &report.transcript {
        out.push_str(&format!("  {}\n", line));
    }

    let outcome = match (&report.failure, &report.returned) {
        (Some(failure), _) => format!("=> {}", failure).red().to_string(),
        (None, Some(value)) => format!("=> returned {}", value).green().to_string(),
        (None, None) => "=> done".green().to_string(),
    };
    out.push_str(&format!("  {}\n\n", outcome));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_all() {
        let selected = select(&[], true).unwrap();
        assert_eq!(selected.len(), Scenario::ALL.len());
    }

    #[test]
    fn test_select_keeps_order() {
        let names = vec!["named".to_string(), "capture".to_string()];
        assert_eq!(
            select(&names, false).unwrap(),
            vec![Scenario::Named, Scenario::Capture]
        );
    }

    #[test]
    fn test_select_rejects_unknown_name() {
        let names = vec!["capture".to_string(), "bogus".to_string()];
        let err = select(&names, false).unwrap_err();
        assert_eq!(err.to_string(), "unknown scenario 'bogus'");
    }

    #[test]
    fn test_select_requires_something() {
        assert!(select(&[], false).is_err());
    }

    #[test]
    fn test_render_text_includes_transcript_and_value() {
        let report = Scenario::Named.run(&Runtime::new());
        let text = render_text(&report);
        assert!(text.contains("named"));
        assert!(text.contains("  defer2: 1\n  defer1: 2\n"));
        assert!(text.contains("=> returned 2"));
    }

    #[test]
    fn test_render_text_shows_failure() {
        let report = Scenario::Masking.run(&Runtime::new());
        let text = render_text(&report);
        assert!(text.contains("deferred action 'first' (#1) failed: first cleanup failed"));
    }
}
