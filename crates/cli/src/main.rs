//! Keepsake CLI - ks command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cli_lib::{cmd, paths};

/// Keepsake - automatic timestamped copies of files you care about
#[derive(Parser)]
#[command(name = "ks")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
    /// Start the watch daemon
    Start {
        /// Run in foreground (for debugging)
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the watch daemon
    Stop,
    /// Show daemon and version-store status
    Status,
    /// List stored versions of a tracked file name
    Versions {
        /// Original file name (e.g. report.pdf)
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = paths::resolve_config_path(cli.config)?;

    match cli.command {
        Commands::Init { force } => cmd::init::run(&config_path, force),
        Commands::Start { foreground } => cmd::start::run(&config_path, foreground).await,
        Commands::Stop => cmd::stop::run().await,
        Commands::Status => cmd::status::run(&config_path),
        Commands::Versions { name } => cmd::versions::run(&config_path, &name),
    }
}
