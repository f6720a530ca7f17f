//! CLI command handlers.

mod commands;
mod config;
mod run;

pub use commands::{Cli, Commands, ModelArgs};
pub use config::{load_config, print_config};
pub use run::run_compliance;
