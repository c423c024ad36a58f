//! Vehicle image endpoints
//!
//! - `GET|POST /api/ensureVinFolder/{vin}`: create the VIN's blob folder
//! - `GET /api/vehicles/{id}/image`: primary image URL and whether it exists

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::blob::{ensure_vin_folder, image_exists, sanitize_vin_folder, FolderOutcome};
use crate::db::repos::VehicleRepo;
use crate::http::error::ApiError;
use crate::http::extractors::ValidId;
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct FolderResponse {
    pub success: bool,
    #[serde(flatten)]
    pub folder: FolderOutcome,
}

#[derive(Serialize)]
pub struct ImageResponse {
    pub success: bool,
    pub url: String,
    pub exists: bool,
}

/// GET|POST /api/ensureVinFolder/{vin}
async fn ensure_folder(
    State(state): State<Arc<AppState>>,
    Path(vin): Path<String>,
) -> Result<Json<FolderResponse>, ApiError> {
    let store = state.blob.as_deref().ok_or_else(|| ApiError::Unavailable {
        message: "Blob storage is not configured".to_string(),
    })?;

    let folder = ensure_vin_folder(store, &state.images, &vin).await?;
    Ok(Json(FolderResponse {
        success: true,
        folder,
    }))
}

/// GET /api/vehicles/{id}/image
async fn vehicle_image(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
) -> Result<Json<ImageResponse>, ApiError> {
    let vehicle = VehicleRepo::new(&state.executor).get(id).await?;
    let vin = sanitize_vin_folder(&vehicle.vin).ok_or_else(|| ApiError::Internal {
        message: format!("vehicle {} has an unusable VIN", id),
    })?;

    let url = state.images.image_url(&vin);
    let exists = image_exists(&state.http, &url).await;

    Ok(Json(ImageResponse {
        success: true,
        url,
        exists,
    }))
}

/// Image routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ensureVinFolder/{vin}", get(ensure_folder).post(ensure_folder))
        .route("/vehicles/{id}/image", get(vehicle_image))
}
