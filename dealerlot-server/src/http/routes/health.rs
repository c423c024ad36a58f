//! Health check endpoint
//!
//! Runs `SELECT 1` through the executor, so the probe goes through the same
//! breaker and pool as real traffic.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use chrono::Utc;
use dealerlot_core::{BreakerSnapshot, CircuitState, PoolStatus};
use serde::Serialize;
use sqlx::FromRow;

use crate::db::Params;
use crate::http::server::AppState;

#[derive(FromRow)]
struct Ping {
    #[allow(dead_code)]
    ok: i32,
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    pub circuit_breaker: BreakerSnapshot,
    pub breaker_state: CircuitState,
    pub pool: PoolStatus,
    pub response_time_ms: u64,
    pub timestamp: String,
    pub version: &'static str,
}

/// GET /api/health
async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let started = Instant::now();
    let result = state
        .executor
        .execute_query::<Ping>("SELECT 1 AS ok", &Params::new())
        .await;

    let (status, http_status) = if result.success {
        ("healthy", StatusCode::OK)
    } else {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    };

    // Driver and pool messages stay in the log
    let error = result.kind.map(|kind| {
        tracing::warn!(error = ?result.error, ?kind, "Health check failed");
        kind.reason()
    });

    let body = HealthResponse {
        status,
        database: if result.success { "connected" } else { "disconnected" },
        error,
        circuit_breaker: state.executor.breaker_snapshot(),
        breaker_state: state.executor.breaker_state(),
        pool: state.executor.pool_status(),
        response_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
    };

    (http_status, Json(body))
}

/// Health routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}
