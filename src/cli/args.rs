//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Groundwork - Workdir Provisioning and Source Caching
///
/// Provisions isolated working directories for infrastructure
/// components from local or remote sources.
#[derive(Parser, Debug)]
#[command(name = "groundwork")]
#[command(author, version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "GROUNDWORK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Project base path (overrides configuration)
    #[arg(short, long, global = true)]
    pub base_path: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision a component workdir
    Provision(ProvisionArgs),

    /// Remove provisioned workdirs
    Clean(CleanArgs),

    /// Manage the source cache
    Cache(CacheArgs),
}

/// Arguments for the provision command
#[derive(Parser, Debug)]
pub struct ProvisionArgs {
    /// Component name
    #[arg(short = 'n', long)]
    pub component: Option<String>,

    /// Stack name
    #[arg(short, long)]
    pub stack: Option<String>,

    /// Component configuration file (JSON); flags override its fields
    #[arg(short = 'f', long)]
    pub spec: Option<PathBuf>,
}

/// Arguments for the clean command
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Component to clean
    #[arg(short = 'n', long, requires = "stack")]
    pub component: Option<String>,

    /// Stack the component belongs to
    #[arg(short, long)]
    pub stack: Option<String>,

    /// Remove every workdir
    #[arg(long)]
    pub all: bool,

    /// Remove workdirs idle longer than the TTL
    #[arg(long)]
    pub expired: bool,

    /// Idle TTL for --expired (e.g. 7d, weekly)
    #[arg(long, requires = "expired")]
    pub ttl: Option<String>,

    /// Show what would be removed without deleting
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show cache location, entries, and disk usage
    Info,

    /// Remove the entire source cache
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}
