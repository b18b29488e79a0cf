//! mapbench CLI - Command-line interface
//!
//! Runs the built-in scenarios as timed trials and compares a client-side
//! loop against a server-side map of the same computation.

mod commands;
mod error;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use console::style;
use mapbench::config::{config_file_path, ConfigFile};
use mapbench::logging::{self, WorkerGuard};
use mapbench::scenario::Scenario;
use mapbench::variant::Strategy;

use commands::common::TrialArgs;
use commands::config::ConfigCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "mapbench", version = mapbench::VERSION, about = "Benchmark client-side loops against server-side mapping")]
struct Cli {
    /// Configuration file (default: ~/.config/mapbench/config.ini)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter, e.g. info or mapbench=debug (RUST_LOG takes precedence)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the built-in scenarios
    List,

    /// Time one variant of a scenario
    Run {
        /// Scenario name (see `mapbench list`)
        #[arg(long)]
        scenario: Scenario,

        /// iterative or mapped
        #[arg(long)]
        variant: Strategy,

        #[command(flatten)]
        trial: TrialArgs,
    },

    /// Time both variants of a scenario and report the speedup
    Compare {
        /// Scenario name; all scenarios when omitted
        #[arg(long)]
        scenario: Option<Scenario>,

        #[command(flatten)]
        trial: TrialArgs,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {}", style("error:").red().bold(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let path = cli.config.unwrap_or_else(config_file_path);
    let log_level = cli.log_level;

    match cli.command {
        // Config management must work even when the file does not parse.
        Commands::Config { command } => commands::config::run(command, &path),
        Commands::List => commands::list::run(),
        Commands::Run {
            scenario,
            variant,
            trial,
        } => {
            let (config, _guard) = load(&path, log_level)?;
            commands::run::run(config, scenario, variant, &trial)
        }
        Commands::Compare { scenario, trial } => {
            let (config, _guard) = load(&path, log_level)?;
            let scenarios = match scenario {
                Some(scenario) => vec![scenario],
                None => Scenario::all().to_vec(),
            };
            commands::compare::run(config, &scenarios, &trial)
        }
    }
}

/// Loads the config file and installs logging from it.
fn load(
    path: &Path,
    log_level: Option<String>,
) -> Result<(ConfigFile, Option<WorkerGuard>), CliError> {
    let config = ConfigFile::load_from(path)?;
    let level = log_level.unwrap_or_else(|| config.logging.level.clone());
    let guard = logging::init(&level, config.logging.file.as_deref())?;
    Ok((config, guard))
}
