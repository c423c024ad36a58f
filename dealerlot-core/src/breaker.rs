//! Circuit breaker guarding connection acquisition.
//!
//! # States
//! - Closed: acquisitions go through to the pool
//! - Open: acquisitions fail fast until `next_attempt_at`
//! - Half-open: transient; the first acquisition at/after `next_attempt_at`
//!   closes the breaker, resets the failure count and tries once
//!
//! # Transitions
//! ```text
//! Closed → Open:    failures >= threshold (next_attempt_at = now + timeout)
//! Open → HalfOpen:  first gate check at/after next_attempt_at
//! HalfOpen → Closed immediately; failures count again from 0
//! ```
//!
//! Because the half-open probe restarts the count at zero, a single failed
//! probe only re-opens the breaker when `threshold <= 1`.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

/// Failures needed to open the breaker
pub const DEFAULT_THRESHOLD: u32 = 5;

/// How long the breaker stays open before a probe is allowed
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Breaker tuning
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub threshold: u32,
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    /// Open, but the next gate check will let a probe through
    HalfOpen,
}

/// Point-in-time diagnostics, serialized into error and health responses
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub is_open: bool,
    pub failures: u32,
    pub threshold: u32,
    /// Wall-clock time of the next allowed attempt
    pub next_attempt: DateTime<Utc>,
}

#[derive(Debug)]
struct BreakerState {
    failures: u32,
    is_open: bool,
    next_attempt_at: Instant,
}

/// Consecutive-failure circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState {
                failures: 0,
                is_open: false,
                next_attempt_at: Instant::now(),
            }),
        }
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gate an acquisition attempt.
    ///
    /// Returns `Err(retry_at)` while open and not yet due. When due, moves
    /// through half-open to closed (failures reset to 0) and lets the caller
    /// try once.
    pub fn try_acquire(&self) -> Result<(), DateTime<Utc>> {
        let mut state = self.lock();
        if !state.is_open {
            return Ok(());
        }

        let now = Instant::now();
        if now < state.next_attempt_at {
            return Err(wall_clock(state.next_attempt_at, now));
        }

        tracing::info!("Circuit breaker half-open, probing connection");
        state.is_open = false;
        state.failures = 0;
        Ok(())
    }

    /// Any success closes the breaker and clears the count
    pub fn record_success(&self) {
        let mut state = self.lock();
        if state.failures > 0 {
            tracing::debug!(failures = state.failures, "Circuit breaker reset after success");
        }
        state.failures = 0;
        state.is_open = false;
    }

    /// Count a failure, opening the breaker once the threshold is reached.
    ///
    /// Failures reported while already open are counted but leave
    /// `next_attempt_at` where it is.
    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.failures = state.failures.saturating_add(1);

        if state.is_open {
            tracing::debug!(failures = state.failures, "Failure recorded while open");
        } else if state.failures >= self.config.threshold {
            state.is_open = true;
            state.next_attempt_at = Instant::now() + self.config.timeout;
            tracing::warn!(
                failures = state.failures,
                timeout = ?self.config.timeout,
                "Circuit breaker opened"
            );
        } else {
            tracing::debug!(
                failures = state.failures,
                threshold = self.config.threshold,
                "Connection failure recorded"
            );
        }
    }

    pub fn state(&self) -> CircuitState {
        let state = self.lock();
        match (state.is_open, Instant::now() >= state.next_attempt_at) {
            (false, _) => CircuitState::Closed,
            (true, false) => CircuitState::Open,
            (true, true) => CircuitState::HalfOpen,
        }
    }

    pub fn failures(&self) -> u32 {
        self.lock().failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.lock();
        BreakerSnapshot {
            is_open: state.is_open,
            failures: state.failures,
            threshold: self.config.threshold,
            next_attempt: wall_clock(state.next_attempt_at, Instant::now()),
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

/// Map a monotonic deadline onto the wall clock
fn wall_clock(at: Instant, now: Instant) -> DateTime<Utc> {
    let remaining = at.saturating_duration_since(now);
    Utc::now() + chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::zero())
}
