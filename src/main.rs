use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use std::process::ExitCode;
use tracing::error;

use msort::logging::init_logger;

mod commands;
mod tui;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::Subcommand)]
enum Commands {
    /// Plan the reorganisation and print it, without touching any file
    Scan {
        #[command(flatten)]
        args: commands::SortArgs,
    },
    /// Plan, confirm, then copy or move everything into the target
    Run {
        #[command(flatten)]
        args: commands::SortArgs,
        /// Apply without asking for confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

fn run(cli: Cli) -> Result<bool> {
    let rt = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let outcome = match cli.command {
        Commands::Scan { args } => commands::scan::scan_library(&rt, &args)?,
        Commands::Run { args, yes } => commands::run::run_library(&rt, &args, yes)?,
    };
    Ok(!outcome.is_cancelled())
}

fn main() -> Result<ExitCode> {
    // Load environment variables from a .env file if present
    dotenv().ok();
    let _log_guard = init_logger()?;
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::from(130)),
        Err(e) => {
            error!("❌ {:#}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
