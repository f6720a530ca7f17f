//! CLI command definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Sluice - budget-aware batching for rate-limited LLM services
#[derive(Parser, Debug)]
#[command(name = "sluice")]
#[command(about = "Budget-aware admission control, retry and batching for LLM completion calls", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to layered sluice.toml lookup)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a compliance request and print the report as JSON
    Run {
        /// Path to the compliance request JSON file
        #[arg(long)]
        input: PathBuf,

        /// Write the report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Print the effective, validated configuration as TOML
    Config,
}

/// Remote model selection
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Model identifier
    #[arg(long, env = "SLUICE_MODEL", default_value = "gpt-4.1-mini")]
    pub model: String,

    /// API root, for proxies and compatible services
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    /// Cap on generated tokens per call
    #[arg(long)]
    pub max_output_tokens: Option<u32>,
}
