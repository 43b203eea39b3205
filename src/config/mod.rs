// src/config/mod.rs
mod models;

pub use models::*;

use clap::Parser;

/// Parse configuration from the command line and environment, then validate it.
///
/// Missing or malformed flags make clap print usage and exit nonzero.
pub fn load_config() -> Result<Config, ConfigError> {
    let config = Config::parse();
    config.validate()?;
    Ok(config)
}
