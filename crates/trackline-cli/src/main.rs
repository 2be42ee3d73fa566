//! trackline CLI - Hierarchical Rollup & Aggregation Engine
//!
//! Command-line interface for resolving timing windows, delivery status,
//! completion rollups, and pivot tables over issue snapshots.

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "trackline")]
#[command(author, version, about = "Hierarchical rollup engine for issue trackers", long_about = None)]
struct Cli {
    /// Config file (defaults to ./trackline.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a snapshot and report forest diagnostics
    Check {
        /// Snapshot file (JSON array of issues)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Treat diagnostics as errors
        #[arg(long)]
        strict: bool,
    },

    /// Resolve timing windows for every tree in a snapshot
    Timeline {
        /// Snapshot file (JSON array of issues)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Merge strategy chain, comma separated
        #[arg(long)]
        chain: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Classify delivery status against a prior snapshot
    Status {
        /// Current snapshot file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Prior snapshot file for slip detection
        #[arg(long)]
        prior: Option<PathBuf>,

        /// Reference date (defaults to today)
        #[arg(long, value_name = "YYYY-MM-DD")]
        as_of: Option<chrono::NaiveDate>,

        /// Merge strategy chain, comma separated
        #[arg(long)]
        chain: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Roll up completion estimates bottom-up
    Completion {
        /// Snapshot file (JSON array of issues)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Rollup policy chain (cascade, level-average), comma separated,
        /// one entry per hierarchy depth; the last entry repeats
        #[arg(long)]
        policy: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Group and aggregate issues into a pivot table
    Pivot {
        /// Snapshot file (JSON array of issues)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Group-by dimensions, comma separated (team, month, level, status)
        #[arg(long, default_value = "team")]
        by: String,
    },
}

fn main() -> process::ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            process::ExitCode::FAILURE
        }
    }
}

fn run() -> Result<process::ExitCode> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Check { file, strict }) => commands::check(&file, strict),
        Some(Commands::Timeline { file, chain, format }) => {
            let chain = config.chain(chain.as_deref())?;
            commands::timeline(&file, &chain, &format)?;
            Ok(process::ExitCode::SUCCESS)
        }
        Some(Commands::Status {
            file,
            prior,
            as_of,
            chain,
            format,
        }) => {
            let chain = config.chain(chain.as_deref())?;
            let as_of = as_of.unwrap_or_else(|| chrono::Local::now().date_naive());
            commands::status(&file, prior.as_deref(), as_of, &chain, &format)?;
            Ok(process::ExitCode::SUCCESS)
        }
        Some(Commands::Completion { file, policy, format }) => {
            let policies = config.policy(policy.as_deref())?;
            commands::completion(&file, policies, &format)?;
            Ok(process::ExitCode::SUCCESS)
        }
        Some(Commands::Pivot { file, by }) => {
            commands::pivot(&file, &by)?;
            Ok(process::ExitCode::SUCCESS)
        }
        None => {
            println!("trackline - Hierarchical rollup engine");
            println!("Run with --help for usage information");
            Ok(process::ExitCode::SUCCESS)
        }
    }
}
