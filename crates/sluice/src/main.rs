//! Sluice CLI binary.
//!
//! - Run a compliance request through the OpenAI Responses API
//! - Print the effective configuration

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, print_config, run_compliance};

    // Load .env before reading OPENAI_API_KEY or SLUICE__* overrides
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    sluice::init_tracing(cli.json_logs).map_err(|e| e as Box<dyn std::error::Error>)?;

    match cli.command {
        Commands::Run { input, output, model } => {
            let config = cli::load_config(cli.config.as_deref())?;
            run_compliance(&config, &input, output.as_deref(), &model).await?;
        }
        Commands::Config => {
            let config = cli::load_config(cli.config.as_deref())?;
            print_config(&config)?;
        }
    }

    Ok(())
}
