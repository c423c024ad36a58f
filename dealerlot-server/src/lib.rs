//! dealerlot-server: HTTP API for the dealership inventory
//!
//! Vehicle records go through a breaker-guarded SQL pool; images live in
//! blob storage under one folder per VIN.

pub mod blob;
pub mod config;
pub mod db;
pub mod http;
pub mod models;
pub mod rewrite;

pub use config::AppConfig;
pub use http::{build_router, run_server, AppState, ServerConfig, ServerError};
