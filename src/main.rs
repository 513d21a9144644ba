//! gridfsm - Command-line interface for grid-defined state machines
//!
//! Compiles a manifest and its grid, then answers questions about the
//! resulting machine or dry-runs a single event against it.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use gridfsm_loader::LoaderConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridfsm")]
#[command(about = "Inspect and dry-run grid-defined state machines")]
#[command(version)]
struct Cli {
    /// Manifest file (JSON or YAML)
    #[arg(short, long, env = "GRIDFSM_MANIFEST")]
    manifest: PathBuf,

    /// Directory to search for the grid (repeatable, defaults to the manifest's directory)
    #[arg(short = 'd', long = "resource-dir")]
    resource_dirs: Vec<PathBuf>,

    /// Grid field delimiter
    #[arg(long)]
    delimiter: Option<char>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile the manifest and grid and report any error
    Check,

    /// List all states
    States,

    /// List events, optionally for one state and filtered by roles
    Events {
        /// Only events out of this state
        #[arg(short, long)]
        state: Option<String>,

        /// Caller roles; restricted events need at least one of them
        #[arg(short, long = "role")]
        roles: Vec<String>,
    },

    /// List the states reachable from a state in one transition
    Targets {
        /// Source state
        #[arg(short, long)]
        state: String,
    },

    /// Show a named path
    Path {
        /// Path name
        #[arg(default_value = gridfsm_core::DEFAULT_PATH)]
        name: String,
    },

    /// Fire one event against an entity in the given state
    Fire {
        /// Current state of the entity
        #[arg(short, long)]
        state: String,

        /// Event to fire
        #[arg(short, long)]
        event: String,

        /// Evaluator (manifest name or type id) that should pass; all others fail
        #[arg(short, long = "pass")]
        passes: Vec<String>,

        /// Caller roles
        #[arg(short, long = "role")]
        roles: Vec<String>,

        /// Context parameter as KEY=JSON (or KEY=@file.json)
        #[arg(long = "param")]
        params: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration (from file if GRIDFSM_CONFIG is set, then env overrides)
    let mut config = match LoaderConfig::load() {
        Ok(c) => c,
        Err(e) => {
            if std::env::var("GRIDFSM_CONFIG").is_ok() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("Using default configuration");
            LoaderConfig::default()
        }
    };

    if !cli.resource_dirs.is_empty() {
        config.resource_dirs = cli.resource_dirs.clone();
    } else if std::env::var("GRIDFSM_RESOURCE_DIRS").is_err() {
        let base = cli
            .manifest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        config.resource_dirs = vec![base];
    }
    if let Some(delimiter) = cli.delimiter {
        config.delimiter = delimiter;
    }

    let passes = match &cli.command {
        Commands::Fire { passes, .. } => passes.clone(),
        _ => Vec::new(),
    };

    let session = match commands::Session::load(&cli.manifest, config, &passes) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("{} [{}]: {}", "Error".red(), e.error_code(), e);
            std::process::exit(1);
        }
    };

    match commands::execute(&session, cli.command) {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
