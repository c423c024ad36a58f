//! Application configuration - environment loading
//!
//! Configuration is loaded from environment variables:
//! - `AZURE_SQL_CONNECTION_STRING`, `SQL_CONNECTION_STRING`, `DATABASE_URL`:
//!   SQL connection string, first non-empty wins
//! - `AZURE_STORAGE_CONNECTION_STRING`: blob storage (optional)
//! - `IMAGE_BASE_URL`: public base URL for vehicle images
//! - `RATE_LIMIT_INVENTORY`, `RATE_LIMIT_DASHBOARD`: `max/window_ms/min_delay_ms`

use dealerlot_core::{ConnectionSources, RateLimitConfig, RateLimitError, SQL_CONNECTION_VARS};

/// Default public location of vehicle images
pub const DEFAULT_IMAGE_BASE_URL: &str =
    "https://dealerlotimages.blob.core.windows.net/vehicle-images/";

/// Configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {source}")]
    RateLimit {
        var: &'static str,
        #[source]
        source: RateLimitError,
    },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Prioritized SQL connection-string candidates
    pub sql_sources: ConnectionSources,
    /// SAS-form blob connection string; `None` disables VIN folders
    pub blob_connection_string: Option<String>,
    pub image_base_url: String,
    pub inventory_limit: RateLimitConfig,
    pub dashboard_limit: RateLimitConfig,
}

impl AppConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let sql_sources = ConnectionSources::from_pairs(
            SQL_CONNECTION_VARS
                .iter()
                .map(|&name| (name, lookup(name))),
        );

        let inventory_limit = match non_empty("RATE_LIMIT_INVENTORY") {
            Some(spec) => RateLimitConfig::parse(&spec).map_err(|source| {
                ConfigError::RateLimit {
                    var: "RATE_LIMIT_INVENTORY",
                    source,
                }
            })?,
            None => RateLimitConfig::inventory(),
        };
        let dashboard_limit = match non_empty("RATE_LIMIT_DASHBOARD") {
            Some(spec) => RateLimitConfig::parse(&spec).map_err(|source| {
                ConfigError::RateLimit {
                    var: "RATE_LIMIT_DASHBOARD",
                    source,
                }
            })?,
            None => RateLimitConfig::dashboard(),
        };

        Ok(Self {
            sql_sources,
            blob_connection_string: non_empty("AZURE_STORAGE_CONNECTION_STRING"),
            image_base_url: non_empty("IMAGE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_IMAGE_BASE_URL.to_string()),
            inventory_limit,
            dashboard_limit,
        })
    }

    /// Create config with an explicit SQL source and nothing else (for testing)
    pub fn with_sources(sql_sources: ConnectionSources) -> Self {
        Self {
            sql_sources,
            blob_connection_string: None,
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            inventory_limit: RateLimitConfig::inventory(),
            dashboard_limit: RateLimitConfig::dashboard(),
        }
    }

    /// Put an explicit database URL (e.g. `--database-url`) ahead of the environment
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.sql_sources = self.sql_sources.with_override("--database-url", url);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();

        assert!(config.sql_sources.resolve().is_none());
        assert!(config.blob_connection_string.is_none());
        assert_eq!(config.image_base_url, DEFAULT_IMAGE_BASE_URL);
        assert_eq!(config.inventory_limit, RateLimitConfig::inventory());
        assert_eq!(config.dashboard_limit, RateLimitConfig::dashboard());
    }

    #[test]
    fn sql_sources_follow_priority() {
        let config = AppConfig::from_lookup(lookup(&[
            ("AZURE_SQL_CONNECTION_STRING", ""),
            ("SQL_CONNECTION_STRING", "postgres://second"),
            ("DATABASE_URL", "postgres://third"),
        ]))
        .unwrap();

        assert_eq!(
            config.sql_sources.resolve(),
            Some(("SQL_CONNECTION_STRING", "postgres://second"))
        );
    }

    #[test]
    fn database_url_flag_overrides_env() {
        let config = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://env")]))
            .unwrap()
            .with_database_url("postgres://flag");

        assert_eq!(config.sql_sources.resolve().map(|(_, v)| v), Some("postgres://flag"));
    }

    #[test]
    fn rate_limits_from_env() {
        let config = AppConfig::from_lookup(lookup(&[("RATE_LIMIT_INVENTORY", "5/1000/50")]))
            .unwrap();

        assert_eq!(config.inventory_limit.max_calls(), 5);
        assert_eq!(config.inventory_limit.time_window(), Duration::from_secs(1));
        assert_eq!(config.inventory_limit.min_delay(), Duration::from_millis(50));
    }

    #[test]
    fn invalid_rate_limit_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("RATE_LIMIT_DASHBOARD", "0/1000/0")]))
            .unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT_DASHBOARD"));
    }

    #[test]
    fn blank_blob_string_disables_storage() {
        let config =
            AppConfig::from_lookup(lookup(&[("AZURE_STORAGE_CONNECTION_STRING", "  ")])).unwrap();
        assert!(config.blob_connection_string.is_none());
    }
}
