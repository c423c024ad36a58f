//! Database migration command

use anyhow::{Context, Result};
use clap::Parser;

use dealerlot_server::db::{create_pool, migrations};

use super::load_config;

/// Arguments for the migrate command
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Database URL (overrides AZURE_SQL_CONNECTION_STRING / SQL_CONNECTION_STRING / DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,
}

/// Create or update the inventory schema
pub async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let config = load_config(args.database_url)?;
    let (source, url) = config.sql_sources.resolve().context(
        "No SQL connection string. Set --database-url, AZURE_SQL_CONNECTION_STRING, \
         SQL_CONNECTION_STRING or DATABASE_URL",
    )?;

    tracing::info!(source, "Connecting for migrations");
    let pool = create_pool(url)
        .await
        .context("Failed to create database pool")?;

    migrations::run(&pool)
        .await
        .context("Failed to run migrations")?;

    pool.close().await;
    Ok(())
}
