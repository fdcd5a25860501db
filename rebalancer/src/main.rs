//! CLI entry point for the driftbook rebalancer.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};

use driftbook_rebalancer::commands;
use driftbook_rebalancer::config::Config;
use driftbook_rebalancer::error::Error;

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Drift-aware portfolio rebalancer built on driftbook")]
#[command(version)]
struct Cli {
    /// Path to config.toml (defaults apply if it does not exist)
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a model file against every business rule
    Validate {
        /// Path to model.json
        model: PathBuf,
    },

    /// Show how far the book has drifted from the model
    Drift {
        /// Path to model.json
        model: PathBuf,
        /// Path to book.json
        book: PathBuf,
    },

    /// Compute target quantities and the trades that reach them
    Optimize {
        /// Path to model.json
        model: PathBuf,
        /// Path to book.json
        book: PathBuf,

        /// Solver time limit in seconds (overrides the config)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Run the solver self-test
    Health,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load_or_default(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Validate { model } => commands::validate(&model).map(|_| ()),
        Command::Drift { model, book } => commands::drift(&config, &model, &book).map(|_| ()),
        Command::Optimize {
            model,
            book,
            timeout,
        } => match commands::optimize(&config, &model, &book, timeout.map(Duration::from_secs)) {
            Ok(Some(_)) => Ok(()),
            Ok(None) => process::exit(3),
            Err(e) => Err(e),
        },
        Command::Health => commands::health(&config),
    };

    if let Err(e) = result {
        match &e {
            Error::Core(inner) if inner.is_validation() || inner.is_business_rule() => {
                eprintln!("Invalid input: {e}");
                process::exit(2);
            }
            Error::Unhealthy(_) => {
                eprintln!("{e}");
                process::exit(4);
            }
            _ => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}
