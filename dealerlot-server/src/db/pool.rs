//! Database connection pool management
//!
//! Uses sqlx PgPool with explicit connection limits. The pool itself is
//! opened lazily by [`dealerlot_core::PoolManager`] through [`PgConnector`].

use std::ops::Deref;
use std::time::Duration;

use async_trait::async_trait;
use dealerlot_core::{BoxError, Connector, PoolHandle};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Default maximum connections for the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// How long a query waits for a free connection before failing.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared handle to an open PostgreSQL pool
#[derive(Debug, Clone)]
pub struct DbPool(PgPool);

impl DbPool {
    pub fn new(pool: PgPool) -> Self {
        Self(pool)
    }

    pub fn inner(&self) -> &PgPool {
        &self.0
    }
}

impl Deref for DbPool {
    type Target = PgPool;

    fn deref(&self) -> &PgPool {
        &self.0
    }
}

impl PoolHandle for DbPool {
    fn is_connected(&self) -> bool {
        !self.0.is_closed()
    }
}

/// Opens sqlx pools for the pool manager
#[derive(Debug, Clone)]
pub struct PgConnector {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PgConnector {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Handle = DbPool;

    async fn connect(&self, connection_string: &str) -> Result<DbPool, BoxError> {
        let pool = create_pool_with_options(
            connection_string,
            self.max_connections,
            self.acquire_timeout,
        )
        .await?;
        Ok(DbPool(pool))
    }
}

/// Create a PostgreSQL connection pool with default limits.
///
/// # Errors
///
/// Returns an error if the connection fails.
///
/// # Example
///
/// ```ignore
/// let pool = create_pool("postgres://localhost/dealerlot").await?;
/// ```
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    create_pool_with_options(database_url, DEFAULT_MAX_CONNECTIONS, DEFAULT_ACQUIRE_TIMEOUT).await
}

/// Create a PostgreSQL connection pool with custom options.
pub async fn create_pool_with_options(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
}
