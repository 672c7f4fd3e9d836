//! Finback - an unattended MySQL backup agent.

mod app;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use finback_core::logging::{init_logging, LogConfig};
use finback_core::state::default_data_dir;

/// Command line interface for the Finback backup agent.
#[derive(Parser, Debug)]
#[command(name = "finback")]
#[command(about = "Unattended MySQL backup agent")]
#[command(version)]
struct Cli {
    /// Data directory for the settings store and logs.
    ///
    /// Defaults to the platform data directory (or ./finback_data in
    /// debug builds).
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the agent: poll connectivity and back up on schedule
    Run,

    /// Run a single backup now and exit
    Backup,

    /// Test the configured database connection and exit
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);

    let _logging_guard = init_logging(LogConfig::new(data_dir.join("logs")));
    tracing::info!(data_dir = %data_dir.display(), "Starting Finback");

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => app::run(&data_dir).await,
        Command::Backup => app::backup(&data_dir).await,
        Command::Check => app::check(&data_dir).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Finback exited with an error");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
