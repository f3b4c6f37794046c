use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

/// Deferred-call stack demonstrations.
///
/// Runs small invocations that register deferred actions and prints what
/// each action saw, what the caller received, and which failure won.
///
/// EXAMPLES:
///     deferral list                 Show available scenarios
///     deferral run capture named    Run two scenarios
///     deferral run --all --json     Run everything, JSON output
///     deferral config               Show the effective configuration
///
/// ENVIRONMENT VARIABLES:
///     DEFERRAL_JSON          Set to 'true' for JSON output
///     DEFERRAL_LOG           Log level (error, warn, info, debug, trace)
///     DEFERRAL_TRACE         Set to 'true' to log unwind events
///     DEFERRAL_CATCH_PANICS  Set to 'false' to let panics escape
///     DEFERRAL_MAX_PENDING   Maximum pending actions per frame
///     NO_COLOR               Set to disable colored output
#[derive(Parser)]
#[command(name = "deferral")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use this config file instead of searching for deferral.toml
    #[arg(long, global = true, env = "DEFERRAL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more scenarios
    ///
    /// Prints each scenario's transcript followed by the value or failure the
    /// caller received.
    ///
    /// EXAMPLES:
    ///     deferral run loop
    ///     deferral run release masking
    ///     deferral run --all
    #[command(visible_alias = "r")]
    Run {
        /// Scenario names (see `deferral list`)
        #[arg(required_unless_present = "all")]
        scenarios: Vec<String>,
        /// Run every scenario
        #[arg(long, conflicts_with = "scenarios")]
        all: bool,
        /// Output reports as JSON
        #[arg(long, env = "DEFERRAL_JSON")]
        json: bool,
    },

    /// List the available scenarios
    #[command(visible_alias = "ls")]
    List {
        /// Output as JSON
        #[arg(long, env = "DEFERRAL_JSON")]
        json: bool,
    },

    /// Show the effective configuration
    ///
    /// Merges ~/.deferral/config.toml, the nearest deferral.toml and
    /// DEFERRAL_* overrides, and fills in defaults.
    Config {
        /// Output as JSON
        #[arg(long, env = "DEFERRAL_JSON")]
        json: bool,
    },
}

fn init_logging(verbose: u8, configured_level: &str) {
    let env = env_logger::Env::default().default_filter_or(configured_level);
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(level) = config::verbosity_filter(verbose) {
        builder.filter_level(level);
    }
    builder.format_timestamp(None).try_init().ok();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if config::no_color() {
        colored::control::set_override(false);
    }

    let settings = config::load(cli.config.as_deref())?;
    init_logging(cli.verbose, settings.log_level());
    log::debug!(
        "configuration loaded (project root: {:?})",
        settings.project_root()
    );

    match cli.command {
        Commands::Run {
            scenarios,
            all,
            json,
        } => {
            let args = commands::run::RunArgs {
                scenarios,
                all,
                json,
            };
            commands::run::run(args, &settings)?;
        }
        Commands::List { json } => {
            commands::list::run(json || settings.output_format() == deferral_config::OutputFormat::Json)?;
        }
        Commands::Config { json } => {
            commands::config::run(&settings, json)?;
        }
    }

    Ok(())
}
