//! HTTP server command
//!
//! Runs the inventory API. The database pool is opened lazily on the first
//! query, so the server starts even while the database is down.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;

use dealerlot_server::db::{create_pool, migrations};
use dealerlot_server::{run_server, AppState, ServerConfig};

use super::load_config;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (default: 127.0.0.1:3030)
    #[arg(long, short = 'b', env = "DEALERLOT_BIND", default_value = "127.0.0.1:3030")]
    pub bind: SocketAddr,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long, env = "DEALERLOT_CORS_PERMISSIVE")]
    pub cors_permissive: bool,

    /// Database URL (overrides AZURE_SQL_CONNECTION_STRING / SQL_CONNECTION_STRING / DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Run migrations before serving
    #[arg(long)]
    pub migrate: bool,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = load_config(args.database_url)?;

    match config.sql_sources.resolve() {
        Some((source, url)) => {
            tracing::info!(source, "SQL connection string found");
            if args.migrate {
                let pool = create_pool(url)
                    .await
                    .context("Failed to create database pool")?;
                migrations::run(&pool)
                    .await
                    .context("Failed to run migrations")?;
                pool.close().await;
            }
        }
        None => tracing::warn!(
            candidates = ?config.sql_sources.names(),
            "No SQL connection string configured; database routes will fail"
        ),
    }

    let state = AppState::from_config(&config).context("Failed to build application state")?;

    tracing::info!("Starting dealerlot server on {}", args.bind);

    // Configure server
    let server_config = ServerConfig {
        bind_addr: args.bind,
        cors_permissive: args.cors_permissive,
    };

    // Run server (blocks until shutdown)
    run_server(state, server_config)
        .await
        .context("Server error")?;

    Ok(())
}
