//! Command implementations for the dealerlot CLI

pub mod migrate;
pub mod serve;

pub use migrate::run_migrate;
pub use serve::run_serve;

use anyhow::{Context, Result};
use dealerlot_server::AppConfig;

/// Environment configuration with an optional `--database-url` override
fn load_config(database_url: Option<String>) -> Result<AppConfig> {
    let config = AppConfig::from_env().context("Invalid configuration")?;
    Ok(match database_url {
        Some(url) => config.with_database_url(url),
        None => config,
    })
}
