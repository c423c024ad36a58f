/// Structured error types for dealerlot-core.
///
/// Uses `thiserror` so the server crate can match on variants when mapping
/// failures to HTTP responses. The binary uses `anyhow` on top of these.
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Boxed error returned by a [`Connector`](crate::pool::Connector).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from acquiring a pooled connection
#[derive(Error, Debug)]
pub enum PoolError {
    /// No connection string configured in any recognized source
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// Breaker is open; the pool was not touched
    #[error("Circuit breaker is open; next attempt at {}", .retry_at.to_rfc3339())]
    CircuitOpen { retry_at: DateTime<Utc> },

    /// Opening the pool failed
    #[error("Failed to open connection pool: {source}")]
    Connect {
        #[source]
        source: BoxError,
    },
}

impl PoolError {
    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a connect error from any driver error
    pub fn connect<E>(source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Connect {
            source: source.into(),
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}

/// Errors from the rate limiter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// Rate limit configuration is unusable
    #[error("Invalid rate limit config: {reason}")]
    InvalidConfig { reason: String },

    /// A newer debounce call for the same key replaced this one
    #[error("Debounced call for '{key}' was superseded")]
    Superseded { key: String },
}
