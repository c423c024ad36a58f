//! Inventory listing and dashboard endpoints
//!
//! Both are throttled through the shared rate limiter: listing under
//! `INVENTORY`, dashboard stats under `DASHBOARD`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use dealerlot_core::{DASHBOARD, INVENTORY};
use serde::Serialize;

use crate::db::repos::{Vehicle, VehicleRepo};
use crate::http::error::ApiError;
use crate::http::extractors::ValidQuery;
use crate::http::server::AppState;
use crate::models::{InventoryQuery, VehicleStatus, DEFAULT_LIMIT};

/// Inventory page response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResponse {
    pub success: bool,
    pub vehicles: Vec<Vehicle>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
    pub duration: String,
}

/// Dashboard counts response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub success: bool,
    pub total: i64,
    pub by_status: BTreeMap<&'static str, i64>,
    pub duration: String,
}

fn elapsed(started: Instant) -> String {
    format!("{}ms", started.elapsed().as_millis())
}

/// GET /api/inventory - filtered, sorted, paginated vehicle list
async fn list_inventory(
    State(state): State<Arc<AppState>>,
    ValidQuery(query): ValidQuery<InventoryQuery>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let started = Instant::now();
    let page = query.pagination(DEFAULT_LIMIT);
    let filter = query.filter()?;
    let sort = query.sort()?;

    state.limiter.throttle(INVENTORY, &state.inventory_limit).await;

    let result = VehicleRepo::new(&state.executor)
        .list(page, &filter, sort)
        .await?;

    Ok(Json(InventoryResponse {
        success: true,
        total: result.total,
        page: result.page,
        limit: result.limit,
        total_pages: result.total_pages(),
        has_next: result.has_next(),
        has_prev: result.has_prev(),
        vehicles: result.items,
        duration: elapsed(started),
    }))
}

/// GET /api/dashboard/stats - vehicle counts per status
async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardStats>, ApiError> {
    let started = Instant::now();
    state.limiter.throttle(DASHBOARD, &state.dashboard_limit).await;

    let counts = VehicleRepo::new(&state.executor).status_counts().await?;

    let mut by_status: BTreeMap<&'static str, i64> =
        VehicleStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for row in &counts {
        match VehicleStatus::parse(&row.status) {
            Ok(status) => *by_status.entry(status.as_str()).or_default() += row.count,
            Err(_) => tracing::warn!(status = %row.status, "Unknown vehicle status in database"),
        }
    }

    Ok(Json(DashboardStats {
        success: true,
        total: by_status.values().sum(),
        by_status,
        duration: elapsed(started),
    }))
}

/// Inventory routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/inventory", get(list_inventory))
        .route("/dashboard/stats", get(dashboard_stats))
}
