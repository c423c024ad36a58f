//! Repository implementations for database access
//!
//! Repositories go through the [`QueryExecutor`](crate::db::QueryExecutor)
//! and turn failed envelopes into [`DbError`] so handlers can use `?`.

pub mod vehicles;

use dealerlot_core::BreakerSnapshot;

pub use vehicles::{create_vehicle, StatusCount, Vehicle, VehicleRepo, VehicleWriter};

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Executor reported `success: false`; carries breaker state at the time
    #[error("database error: {message}")]
    Query {
        message: String,
        breaker: BreakerSnapshot,
    },

    /// The pool has no connection string to work with
    #[error("database configuration error: {message}")]
    Configuration { message: String },

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),
}
