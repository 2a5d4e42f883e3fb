//! Tandem - Autonomous Dual-Agent Coding Loop
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tandem::cli::commands;
use tandem::core::LoopConfig;

/// Tandem - autonomous dual-agent coding loop
#[derive(Parser, Debug)]
#[command(name = "tandem")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend preset (mistral, ollama, lm-studio, command)
    #[arg(long, short = 'b', global = true)]
    backend: Option<String>,

    /// Model name
    #[arg(long, short = 'm', global = true)]
    model: Option<String>,

    /// Maximum cycles before stopping
    #[arg(long, global = true)]
    max_cycles: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new loop on a workspace
    Start {
        /// The specification file (idea.md)
        idea: PathBuf,
        /// The workspace directory to build in
        workspace: PathBuf,
    },
    /// Resume a paused loop
    Resume {
        /// The workspace directory
        workspace: PathBuf,
    },
    /// Show the current status of a workspace
    Status {
        /// The workspace directory
        workspace: PathBuf,
    },
    /// Show the completeness history of a workspace
    Score {
        /// The workspace directory
        workspace: PathBuf,
    },
    /// List the known LLM backend presets
    Backends,
    /// Write an example config file
    Config {
        /// Output path (default: ~/.config/tandem/config.toml)
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Build configuration with CLI overrides
    let mut config = LoopConfig::load();
    if let Some(ref backend) = args.backend {
        config.model.backend = backend.clone();
    }
    if let Some(ref model) = args.model {
        config.model.name = model.clone();
    }
    if let Some(max_cycles) = args.max_cycles {
        config.limits.max_cycles = max_cycles;
    }

    match args.command {
        Command::Start { idea, workspace } => {
            commands::cmd_start(&idea, &workspace, config).await?;
        }
        Command::Resume { workspace } => {
            commands::cmd_resume(&workspace, config).await?;
        }
        Command::Status { workspace } => {
            commands::cmd_status(&workspace)?;
        }
        Command::Score { workspace } => {
            commands::cmd_score(&workspace)?;
        }
        Command::Backends => {
            commands::cmd_backends();
        }
        Command::Config { output } => {
            commands::cmd_config(output.as_deref())?;
        }
    }

    Ok(())
}
