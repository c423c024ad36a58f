//! Axum server setup
//!
//! Server skeleton with:
//! - Localhost-only CORS by default
//! - Tracing middleware
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use dealerlot_core::{RateLimitConfig, RateLimiter, ResilientPool};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::routes;
use crate::blob::{AzureBlobStore, BlobError, BlobStore, ImageLocation};
use crate::config::{AppConfig, DEFAULT_IMAGE_BASE_URL};
use crate::db::{PgConnector, QueryExecutor};

const LOCAL_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:3030",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:3030",
];

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:3030)
    pub bind_addr: SocketAddr,

    /// Allow permissive CORS (default: false = localhost only)
    ///
    /// WARNING: Setting this to true allows any origin.
    /// Only use for development or documented use cases.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            cors_permissive: false,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub executor: QueryExecutor,
    pub limiter: RateLimiter,
    pub inventory_limit: RateLimitConfig,
    pub dashboard_limit: RateLimitConfig,
    /// `None` when no blob connection string is configured
    pub blob: Option<Arc<dyn BlobStore>>,
    pub images: ImageLocation,
    /// Client for image existence checks
    pub http: reqwest::Client,
}

impl AppState {
    /// Minimal state around an executor: default limits, no blob storage
    pub fn new(executor: QueryExecutor) -> Self {
        Self {
            executor,
            limiter: RateLimiter::new(),
            inventory_limit: RateLimitConfig::inventory(),
            dashboard_limit: RateLimitConfig::dashboard(),
            blob: None,
            images: ImageLocation {
                base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
                container: "vehicle-images".to_string(),
                prefix: String::new(),
            },
            http: reqwest::Client::new(),
        }
    }

    /// Build the full state: one resilient pool, blob client, limits.
    ///
    /// No connection is opened here; the pool is created on first query.
    pub fn from_config(config: &AppConfig) -> Result<Self, ServerError> {
        let pool = Arc::new(ResilientPool::new(
            PgConnector::default(),
            config.sql_sources.clone(),
        ));

        let blob = match &config.blob_connection_string {
            Some(conn) => {
                let store: Arc<dyn BlobStore> = Arc::new(AzureBlobStore::from_connection_string(conn)?);
                Some(store)
            }
            None => {
                tracing::warn!("AZURE_STORAGE_CONNECTION_STRING not set; VIN folders disabled");
                None
            }
        };

        Ok(Self {
            blob,
            images: ImageLocation::parse(&config.image_base_url)?,
            inventory_limit: config.inventory_limit,
            dashboard_limit: config.dashboard_limit,
            ..Self::new(QueryExecutor::new(pool))
        })
    }

    pub fn with_blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob = Some(store);
        self
    }

    pub fn with_images(mut self, images: ImageLocation) -> Self {
        self.images = images;
        self
    }

    pub fn with_rate_limits(mut self, inventory: RateLimitConfig, dashboard: RateLimitConfig) -> Self {
        self.inventory_limit = inventory;
        self.dashboard_limit = dashboard;
        self
    }
}

/// Build the application router with all routes
pub fn build_router(state: Arc<AppState>, cors_permissive: bool) -> Router {
    // CORS configuration
    let cors = if cors_permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        CorsLayer::permissive()
    } else {
        // Localhost only
        CorsLayer::new()
            .allow_origin(LOCAL_ORIGINS.map(HeaderValue::from_static))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .nest("/api", routes::api_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server.
///
/// # Example
///
/// ```ignore
/// let state = AppState::from_config(&AppConfig::from_env()?)?;
/// run_server(state, ServerConfig::default()).await?;
/// ```
pub async fn run_server(state: AppState, config: ServerConfig) -> Result<(), ServerError> {
    let app = build_router(Arc::new(state), config.cors_permissive);

    // Bind listener
    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    // Run with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Blob(#[from] BlobError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealerlot_core::ConnectionSources;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 3030);
        assert!(!config.cors_permissive);
    }

    #[test]
    fn state_without_blob_storage() {
        let state = AppState::from_config(&AppConfig::with_sources(ConnectionSources::default()))
            .unwrap();

        assert!(state.blob.is_none());
        assert_eq!(state.images.container, "vehicle-images");
    }

    #[test]
    fn bad_blob_connection_string_fails_startup() {
        let mut config = AppConfig::with_sources(ConnectionSources::default());
        config.blob_connection_string = Some("AccountName=lot;EndpointSuffix=core.windows.net".into());

        assert!(matches!(
            AppState::from_config(&config),
            Err(ServerError::Blob(BlobError::Configuration(_)))
        ));
    }

    #[test]
    fn account_key_connection_string_enables_blob_storage() {
        let mut config = AppConfig::with_sources(ConnectionSources::default());
        config.blob_connection_string =
            Some("DefaultEndpointsProtocol=https;AccountName=lot;AccountKey=abc==".into());

        let state = AppState::from_config(&config).unwrap();
        assert!(state.blob.is_some());
    }
}
