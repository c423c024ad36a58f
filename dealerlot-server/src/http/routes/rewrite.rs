//! Description rewrite endpoint
//!
//! Reports a `stages` timeline so clients can show progress. A rejected
//! request only ever reaches the `received` stage.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::post, Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::rewrite::{build_prompt, rewrite_description};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRequest {
    pub description: Option<String>,
    pub preview_only: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct Stage {
    pub name: &'static str,
    pub timestamp: String,
}

impl Stage {
    fn now(name: &'static str) -> Self {
        Self {
            name,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteResponse {
    pub success: bool,
    pub status: &'static str,
    pub preview_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_built: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub stages: Vec<Stage>,
    pub duration: String,
}

/// POST /api/aiRewrite
async fn ai_rewrite(body: Bytes) -> Response {
    let started = Instant::now();
    let mut stages = vec![Stage::now("received")];
    let duration = |started: Instant| format!("{}ms", started.elapsed().as_millis());

    // An unreadable body is treated like a missing description
    let req: RewriteRequest = serde_json::from_slice(&body).unwrap_or_default();
    let preview_only = req.preview_only.unwrap_or(false);

    let Some(description) = req.description.filter(|d| !d.trim().is_empty()) else {
        let body = RewriteResponse {
            success: false,
            status: "error",
            preview_only,
            prompt_built: None,
            rewritten_text: None,
            error: Some("description is required".to_string()),
            status_code: Some(StatusCode::BAD_REQUEST.as_u16()),
            stages,
            duration: duration(started),
        };
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };

    stages.push(Stage::now("loading"));
    let (prompt_built, rewritten_text) = if preview_only {
        (Some(build_prompt(&description)), None)
    } else {
        (None, Some(rewrite_description(&description)))
    };
    stages.push(Stage::now("complete"));

    tracing::debug!(preview_only, chars = description.len(), "Description rewritten");

    Json(RewriteResponse {
        success: true,
        status: "complete",
        preview_only,
        prompt_built,
        rewritten_text,
        error: None,
        status_code: None,
        stages,
        duration: duration(started),
    })
    .into_response()
}

/// Rewrite routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/aiRewrite", post(ai_rewrite))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{app, send, unconfigured_state};
    use super::*;
    use serde_json::{json, Value};

    fn stage_names(body: &Value) -> Vec<&str> {
        body["stages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn preview_returns_prompt() {
        let (status, body) = send(
            app(unconfigured_state()),
            "POST",
            "/api/aiRewrite",
            Some(json!({ "description": "hello world", "previewOnly": true })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["promptBuilt"], "Vehicle Description:\nDescription:\nhello world");
        assert_eq!(body["status"], "complete");
        assert!(body.get("rewrittenText").is_none());
        assert_eq!(stage_names(&body), vec!["received", "loading", "complete"]);
    }

    #[tokio::test]
    async fn rewrite_cleans_description() {
        let (status, body) = send(
            app(unconfigured_state()),
            "POST",
            "/api/aiRewrite",
            Some(json!({ "description": "hello   world.  it is great" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["rewrittenText"]
            .as_str()
            .unwrap()
            .starts_with("Vehicle Description: Hello world."));
        assert!(body["duration"].as_str().unwrap().ends_with("ms"));
        assert!(body["stages"][0]["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn missing_description_is_400_with_received_only() {
        let (status, body) = send(
            app(unconfigured_state()),
            "POST",
            "/api/aiRewrite",
            Some(json!({ "previewOnly": true })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(stage_names(&body), vec!["received"]);
    }

    #[tokio::test]
    async fn blank_description_is_400() {
        let (status, _) = send(
            app(unconfigured_state()),
            "POST",
            "/api/aiRewrite",
            Some(json!({ "description": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
