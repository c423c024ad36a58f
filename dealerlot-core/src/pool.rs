//! Lazily created, reused connection pool behind a circuit breaker.
//!
//! [`PoolManager`] caches one pool handle and hands out clones of it for as
//! long as the handle reports itself connected. [`ResilientPool`] puts a
//! [`CircuitBreaker`] in front of it so a failing database is not hammered
//! with connection attempts.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::config::ConnectionSources;
use crate::error::{BoxError, PoolError};

/// A live pool handle that can be cloned cheaply and shared
pub trait PoolHandle: Clone + Send + Sync + 'static {
    /// Local freshness check; must not do network I/O
    fn is_connected(&self) -> bool;
}

/// Opens pool handles from a connection string
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Handle: PoolHandle;

    async fn connect(&self, connection_string: &str) -> Result<Self::Handle, BoxError>;
}

/// Pool diagnostics for the health endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    pub connected: bool,
    /// A connection attempt currently holds the creation lock
    pub connecting: bool,
    /// Number of pools opened since start
    pub pools_opened: u64,
    /// Which configuration source supplies the connection string
    pub source: Option<String>,
}

/// Owns the single cached pool handle
pub struct PoolManager<C: Connector> {
    connector: C,
    sources: ConnectionSources,
    cached: Mutex<Option<C::Handle>>,
    pools_opened: AtomicU64,
}

impl<C: Connector> PoolManager<C> {
    pub fn new(connector: C, sources: ConnectionSources) -> Self {
        Self {
            connector,
            sources,
            cached: Mutex::new(None),
            pools_opened: AtomicU64::new(0),
        }
    }

    /// Return the cached handle if it is still connected, otherwise open a
    /// new one and cache it.
    ///
    /// The creation lock is held across the open so concurrent first
    /// requests wait for one pool instead of each opening their own. On
    /// failure the previously cached handle stays in place.
    pub async fn get_connection(&self) -> Result<C::Handle, PoolError> {
        let mut cached = self.cached.lock().await;

        if let Some(handle) = cached.as_ref() {
            if handle.is_connected() {
                tracing::trace!("Reusing cached connection pool");
                return Ok(handle.clone());
            }
            tracing::debug!("Cached connection pool is closed, reopening");
        }

        let (source, connection_string) = self.sources.resolve().ok_or_else(|| {
            PoolError::configuration(format!(
                "no SQL connection string configured (checked {})",
                self.sources.names().join(", ")
            ))
        })?;

        tracing::info!(source, "Opening connection pool");
        let handle = self
            .connector
            .connect(connection_string)
            .await
            .map_err(PoolError::connect)?;

        *cached = Some(handle.clone());
        self.pools_opened.fetch_add(1, Ordering::Relaxed);
        Ok(handle)
    }

    /// Drop the cached handle; the next request opens a fresh one
    pub async fn invalidate(&self) {
        if self.cached.lock().await.take().is_some() {
            tracing::info!("Connection pool invalidated");
        }
    }

    pub fn status(&self) -> PoolStatus {
        let (connected, connecting) = match self.cached.try_lock() {
            Ok(cached) => (cached.as_ref().is_some_and(|h| h.is_connected()), false),
            Err(_) => (false, true),
        };

        PoolStatus {
            connected,
            connecting,
            pools_opened: self.pools_opened.load(Ordering::Relaxed),
            source: self.sources.resolve().map(|(name, _)| name.to_string()),
        }
    }
}

/// Pool manager gated by a circuit breaker
pub struct ResilientPool<C: Connector> {
    manager: PoolManager<C>,
    breaker: CircuitBreaker,
    /// Serializes gate, open and outcome so queued callers see the
    /// breaker state left by the attempt ahead of them
    attempt: Mutex<()>,
}

impl<C: Connector> ResilientPool<C> {
    pub fn new(connector: C, sources: ConnectionSources) -> Self {
        Self::with_breaker(connector, sources, CircuitBreakerConfig::default())
    }

    pub fn with_breaker(
        connector: C,
        sources: ConnectionSources,
        breaker: CircuitBreakerConfig,
    ) -> Self {
        Self {
            manager: PoolManager::new(connector, sources),
            breaker: CircuitBreaker::new(breaker),
            attempt: Mutex::new(()),
        }
    }

    fn gate(&self) -> Result<(), PoolError> {
        self.breaker
            .try_acquire()
            .map_err(|retry_at| PoolError::CircuitOpen { retry_at })
    }

    /// Acquire the pool handle through the breaker.
    ///
    /// While the breaker is open this fails with
    /// [`PoolError::CircuitOpen`] without touching the pool manager. The
    /// gate is checked again once the caller holds the attempt lock, so
    /// requests queued behind a failing open are turned away as soon as
    /// the breaker trips.
    pub async fn acquire(&self) -> Result<C::Handle, PoolError> {
        self.gate()?;
        let _attempt = self.attempt.lock().await;
        self.gate()?;

        match self.manager.get_connection().await {
            Ok(handle) => {
                self.breaker.record_success();
                Ok(handle)
            }
            Err(err) => {
                tracing::error!(error = %err, "Connection acquisition failed");
                self.breaker.record_failure();
                Err(err)
            }
        }
    }

    pub async fn invalidate(&self) {
        self.manager.invalidate().await;
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.manager.status()
    }
}
