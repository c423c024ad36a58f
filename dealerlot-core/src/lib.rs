//! dealerlot-core: resilience primitives for the inventory service
//!
//! - [`ratelimit`]: sliding-window rate limiter with min spacing and debounce
//! - [`breaker`]: consecutive-failure circuit breaker
//! - [`pool`]: lazily created, reused pool handle behind the breaker
//! - [`config`]: prioritized connection-string sources

pub mod breaker;
pub mod config;
pub mod error;
pub mod pool;
pub mod ratelimit;

pub use breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::{ConnectionSources, SQL_CONNECTION_VARS};
pub use error::{BoxError, PoolError, RateLimitError};
pub use pool::{Connector, PoolHandle, PoolManager, PoolStatus, ResilientPool};
pub use ratelimit::{RateLimitConfig, RateLimiter, DASHBOARD, INVENTORY};
