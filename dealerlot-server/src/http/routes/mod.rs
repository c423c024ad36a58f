//! Route handlers organized by resource

pub mod health;
pub mod images;
pub mod inventory;
pub mod rewrite;
pub mod vehicles;

use std::sync::Arc;

use axum::Router;

use super::server::AppState;

/// Every `/api` route
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::router())
        .merge(inventory::router())
        .merge(vehicles::router())
        .merge(rewrite::router())
        .merge(images::router())
}
