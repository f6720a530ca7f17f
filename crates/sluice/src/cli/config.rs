//! Configuration loading and display.

use sluice::{SluiceConfig, SluiceResult};
use std::path::Path;
use tracing::debug;

/// Load an explicit file over the defaults, or the layered lookup.
pub fn load_config(path: Option<&Path>) -> SluiceResult<SluiceConfig> {
    match path {
        Some(path) => SluiceConfig::from_file(path),
        None => {
            debug!("No --config given, using layered lookup");
            SluiceConfig::load()
        }
    }
}

/// Print `config` as TOML on stdout.
pub fn print_config(config: &SluiceConfig) -> SluiceResult<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
