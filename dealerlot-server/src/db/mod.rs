//! Database layer - resilient pool, query executor and repositories
//!
//! - One pool per process, opened lazily and guarded by the circuit breaker
//! - All SQL goes through [`QueryExecutor`] with named `@param` bindings
//! - Repositories turn failed envelopes into [`DbError`]

pub mod executor;
pub mod migrations;
pub mod pool;
pub mod repos;

pub use executor::{
    FailureKind, Params, QueryExecutor, QueryFailure, QueryResult, SqlPool, SqlValue,
};
pub use pool::{create_pool, DbPool, PgConnector};
pub use repos::*;
