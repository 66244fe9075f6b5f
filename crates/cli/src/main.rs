//! Thumbgen CLI - thumbgen command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thumbgen_cli::{logging, system_config};

mod cmd;

/// Thumbgen - keeps JPEG thumbnails in sync with an upload directory
#[derive(Parser)]
#[command(name = "thumbgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/thumbgen/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Asset root, overriding the configured one
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile once, then watch the root indefinitely (default)
    Watch,
    /// Reconcile, re-derive every asset, then exit
    Regenerate {
        /// Concurrent derivations (default: watch.workers)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Remove artifacts whose source asset is gone
    Gc,
    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    List,
    /// Show the config file path
    Path {
        /// Create the file from the example if it does not exist
        #[arg(long)]
        create: bool,
    },
    /// Print an example configuration
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Watch);

    // These never need a valid config
    match command {
        Commands::Config(ConfigCommands::Path { create }) => return cmd::config::run_path(create),
        Commands::Config(ConfigCommands::Example) => return cmd::config::run_example(),
        _ => {}
    }

    let (mut config, source) = system_config::load(cli.config.as_deref(), cli.root.as_deref())?;
    let _log_guard = logging::init(&config.logging)?;
    tracing::debug!(source = %source, root = %config.root.display(), "configuration loaded");

    match command {
        Commands::Watch => cmd::watch::run(config).await,
        Commands::Regenerate { jobs } => {
            if let Some(jobs) = jobs {
                config.watch.workers = jobs;
                config.validate()?;
            }
            cmd::regenerate::run(config).await
        }
        Commands::Gc => cmd::gc::run(config).await,
        Commands::Config(ConfigCommands::List) => cmd::config::run_list(&config, &source),
        Commands::Config(_) => Ok(()),
    }
}
