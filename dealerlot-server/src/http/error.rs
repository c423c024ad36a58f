//! API error types with IntoResponse
//!
//! Errors are converted to JSON responses with appropriate status codes:
//! `{success: false, error, statusCode, timestamp}`, plus `circuitBreaker`
//! when the failure came from the database side.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use dealerlot_core::BreakerSnapshot;
use serde_json::json;

use crate::blob::BlobError;
use crate::db::repos::DbError;
use crate::models::ValidationError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Duplicate resource (409)
    Conflict { message: String },

    /// Server misconfigured (500)
    Configuration { message: String },

    /// Optional backing service not configured (503)
    Unavailable { message: String },

    /// Circuit breaker rejected the query (500)
    CircuitOpen { breaker: BreakerSnapshot },

    /// Query failed (500, logged)
    Database {
        message: String,
        breaker: BreakerSnapshot,
    },

    /// Blob storage request failed (502)
    Upstream { message: String },

    /// Internal error (500)
    Internal { message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Configuration { .. }
            | Self::CircuitOpen { .. }
            | Self::Database { .. }
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, breaker) = match self {
            Self::Validation(e) => (e.to_string(), None),
            Self::NotFound { resource, id } => (format!("{} '{}' not found", resource, id), None),
            Self::Conflict { message } | Self::Unavailable { message } => (message, None),
            Self::Configuration { message } => {
                tracing::error!("Configuration error: {}", message);
                ("Server configuration error".to_string(), None)
            }
            Self::CircuitOpen { breaker } => (
                format!(
                    "Database temporarily unavailable; next attempt at {}",
                    breaker.next_attempt.to_rfc3339()
                ),
                Some(breaker),
            ),
            Self::Database { message, breaker } => {
                // Log the actual error, return generic message
                tracing::error!("Database error: {}", message);
                ("Database query failed".to_string(), Some(breaker))
            }
            Self::Upstream { message } => {
                tracing::error!("Blob storage error: {}", message);
                ("Blob storage request failed".to_string(), None)
            }
            Self::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                ("an internal error occurred".to_string(), None)
            }
        };

        let mut body = json!({
            "success": false,
            "error": message,
            "statusCode": status.as_u16(),
            "timestamp": Utc::now().to_rfc3339(),
        });
        if let Some(breaker) = breaker {
            body["circuitBreaker"] = json!(breaker);
        }

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => Self::NotFound { resource, id },
            DbError::Conflict(message) => Self::Conflict { message },
            DbError::Configuration { message } => Self::Configuration { message },
            DbError::Query { breaker, .. } if breaker.is_open => Self::CircuitOpen { breaker },
            DbError::Query { message, breaker } => Self::Database { message, breaker },
        }
    }
}

impl From<BlobError> for ApiError {
    fn from(e: BlobError) -> Self {
        match e {
            BlobError::InvalidVin => Self::Validation(ValidationError::InvalidFormat {
                field: "vin",
                reason: "must contain at least one alphanumeric character",
            }),
            BlobError::Configuration(message) => Self::Unavailable { message },
            BlobError::Storage(e) => Self::Upstream {
                message: e.to_string(),
            },
        }
    }
}
