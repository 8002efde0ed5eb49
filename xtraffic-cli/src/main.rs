//! XTraffic CLI - Command-line interface
//!
//! Replays recorded traffic reports through the position pipeline and prints
//! what a renderer would show.

mod commands;
mod error;
mod render;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigArgs;
use commands::replay::ReplayArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "xtraffic")]
#[command(version = xtraffic::VERSION)]
#[command(about = "Per-track position pipeline for live traffic", long_about = None)]
struct Cli {
    /// Pipeline configuration file (default: ~/.xtraffic/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Flight model file (default: ~/.xtraffic/models.ini)
    #[arg(long, global = true)]
    models: Option<PathBuf>,

    /// Also log to stdout
    #[arg(long, global = true)]
    log_stdout: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recording through the pipeline
    Replay(ReplayArgs),

    /// Show the effective configuration or write the defaults
    Config(ConfigArgs),
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Replay(args) => {
            let runner = CliRunner::new(cli.config.as_deref(), cli.models.as_deref(), cli.log_stdout)?;
            commands::replay::run(args, &runner)
        }
        Commands::Config(mut args) => {
            if args.path.is_none() {
                args.path = cli.config;
            }
            commands::config::run(args)
        }
    }
}
