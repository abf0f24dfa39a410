mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod output;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use clap::Parser;
use tracing::{debug, error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    info!("🚀 stemsim CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let command_result = match cli.command {
        Commands::Simulate(args) => {
            info!("Dispatching to 'simulate' command.");
            commands::simulate::run(args).await
        }
        Commands::Interactive(args) => {
            info!("Dispatching to 'interactive' command.");
            commands::interactive::run(args).await
        }
    };

    match &command_result {
        Ok(_) => info!("✅ Command completed successfully."),
        Err(e) => error!("❌ Command failed: {}", e),
    }

    command_result
}
