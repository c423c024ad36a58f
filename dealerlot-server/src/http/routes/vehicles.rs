//! Vehicle endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::repos::{Vehicle, VehicleRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{ValidId, ValidJson};
use crate::http::server::AppState;
use crate::models::{ValidationError, VehicleDraft, VehicleRequest, VehicleStatus, Vin};

/// Status change request
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

/// VIN lookup request
#[derive(Deserialize)]
pub struct CheckVinRequest {
    pub vin: Option<String>,
}

/// Single vehicle response
#[derive(Serialize)]
pub struct VehicleResponse {
    pub success: bool,
    pub vehicle: Vehicle,
}

impl From<Vehicle> for VehicleResponse {
    fn from(vehicle: Vehicle) -> Self {
        Self {
            success: true,
            vehicle,
        }
    }
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub success: bool,
    pub id: i64,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub id: i64,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct VinExistsResponse {
    pub success: bool,
    pub vin: String,
    pub exists: bool,
}

/// GET /api/vehicles/{id}
async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
) -> Result<Json<VehicleResponse>, ApiError> {
    let vehicle = VehicleRepo::new(&state.executor).get(id).await?;
    Ok(Json(vehicle.into()))
}

/// PUT /api/vehicles/{id} - replace all editable fields
async fn update_vehicle(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
    ValidJson(req): ValidJson<VehicleRequest>,
) -> Result<Json<VehicleResponse>, ApiError> {
    let draft = VehicleDraft::try_from(req)?;
    let vehicle = VehicleRepo::new(&state.executor).update(id, &draft).await?;
    Ok(Json(vehicle.into()))
}

/// DELETE /api/vehicles/{id}
async fn delete_vehicle(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
) -> Result<Json<DeletedResponse>, ApiError> {
    VehicleRepo::new(&state.executor).delete(id).await?;
    Ok(Json(DeletedResponse {
        success: true,
        id,
        message: "Vehicle deleted",
    }))
}

/// PATCH /api/vehicles/{id}/status
async fn set_status(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
    ValidJson(req): ValidJson<StatusRequest>,
) -> Result<Json<VehicleResponse>, ApiError> {
    let status = VehicleStatus::parse(req.status.as_deref().unwrap_or_default())?;
    let vehicle = VehicleRepo::new(&state.executor)
        .set_status(id, status)
        .await?;
    Ok(Json(vehicle.into()))
}

/// POST /api/vehicles/add - 409 when the VIN is already on the lot
async fn add_vehicle(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<VehicleRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let draft = VehicleDraft::try_from(req)?;
    let id = VehicleRepo::new(&state.executor).create(&draft).await?;

    Ok((StatusCode::CREATED, Json(CreatedResponse { success: true, id })))
}

/// POST /api/vehicles/check-vin
async fn check_vin(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<CheckVinRequest>,
) -> Result<Json<VinExistsResponse>, ApiError> {
    let vin = req
        .vin
        .as_deref()
        .map(Vin::new)
        .transpose()?
        .ok_or(ValidationError::Empty { field: "vin" })?;

    let exists = VehicleRepo::new(&state.executor).vin_exists(&vin).await?;

    Ok(Json(VinExistsResponse {
        success: true,
        vin: vin.into_string(),
        exists,
    }))
}

/// Vehicle routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vehicles/add", post(add_vehicle))
        .route("/vehicles/check-vin", post(check_vin))
        .route(
            "/vehicles/{id}",
            get(get_vehicle).put(update_vehicle).delete(delete_vehicle),
        )
        .route("/vehicles/{id}/status", patch(set_status))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{app, send, unconfigured_state, unreachable_state};
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn non_numeric_id_is_400() {
        for (method, uri) in [
            ("GET", "/api/vehicles/abc"),
            ("DELETE", "/api/vehicles/abc"),
            ("DELETE", "/api/vehicles/-3"),
        ] {
            let (status, body) = send(app(unconfigured_state()), method, uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
            assert_eq!(body["error"], "id: must be a positive integer");
        }
    }

    #[tokio::test]
    async fn update_requires_vin() {
        let (status, body) = send(
            app(unconfigured_state()),
            "PUT",
            "/api/vehicles/7",
            Some(json!({ "vin": "  ", "year": 2020, "make": "Ford", "model": "F-150" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "vin is required");
    }

    #[tokio::test]
    async fn add_requires_core_fields() {
        let (status, body) = send(
            app(unconfigured_state()),
            "POST",
            "/api/vehicles/add",
            Some(json!({ "vin": "1HGCM82633A004352", "year": 2020, "make": "Honda" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "model is required");
    }

    #[tokio::test]
    async fn malformed_body_is_400_json() {
        let app = app(unconfigured_state());
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/vehicles/add")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();

        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_status_is_400() {
        let (status, body) = send(
            app(unconfigured_state()),
            "PATCH",
            "/api/vehicles/1/status",
            Some(json!({ "status": "Scrapped" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid status value: 'Scrapped'");
    }

    #[tokio::test]
    async fn missing_status_is_400() {
        let (status, _) = send(
            app(unconfigured_state()),
            "PATCH",
            "/api/vehicles/1/status",
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn check_vin_requires_vin() {
        let (status, _) = send(
            app(unconfigured_state()),
            "POST",
            "/api/vehicles/check-vin",
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn valid_add_reaches_database() {
        let (status, body) = send(
            app(unreachable_state()),
            "POST",
            "/api/vehicles/add",
            Some(json!({
                "vin": "1hgcm82633a004352",
                "year": "2020",
                "make": "Honda",
                "model": "Accord",
                "price": "$21,500"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.get("circuitBreaker").is_some());
    }

    #[tokio::test]
    async fn check_vin_without_connection_string_is_configuration_error() {
        let (status, body) = send(
            app(unconfigured_state()),
            "POST",
            "/api/vehicles/check-vin",
            Some(json!({ "vin": "1HGCM82633A004352" })),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Server configuration error");
    }
}
