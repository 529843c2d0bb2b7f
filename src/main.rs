//! Groundwork - Workdir Provisioning and Source Caching
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use groundwork::cli::{Cli, Commands};
use groundwork::config::ConfigManager;
use groundwork::error::GroundworkResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> GroundworkResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("groundwork=warn"),
        1 => EnvFilter::new("groundwork=info"),
        _ => EnvFilter::new("groundwork=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let mut config = config_manager.load().await?;

    if let Some(base_path) = cli.base_path {
        config.workdir.base_path = base_path;
    }

    // Dispatch to command
    match cli.command {
        Commands::Provision(args) => groundwork::cli::commands::provision(args, &config).await,
        Commands::Clean(args) => groundwork::cli::commands::clean(args, &config).await,
        Commands::Cache(args) => groundwork::cli::commands::cache(args).await,
    }
}
