//! Sliding-window rate limiter keyed by operation name.
//!
//! Calls are never dropped: `throttle` waits until the trailing window has
//! room and the minimum spacing since the previous call has passed, then
//! records the call. History is a per-key `VecDeque` pruned lazily on each
//! call, so it never holds more than `max_calls` entries. The latest
//! admission is kept separately so spacing holds even when `min_delay`
//! is longer than the window.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::error::RateLimitError;

/// Dashboard summary requests
pub const DASHBOARD: &str = "DASHBOARD";

/// Inventory listing requests
pub const INVENTORY: &str = "INVENTORY";

/// Admission rules for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    max_calls: usize,
    time_window: Duration,
    min_delay: Duration,
}

impl RateLimitConfig {
    /// Validate and build a config.
    ///
    /// `max_calls` must be at least 1 and `time_window` non-zero.
    pub fn new(
        max_calls: usize,
        time_window: Duration,
        min_delay: Duration,
    ) -> Result<Self, RateLimitError> {
        if max_calls == 0 {
            return Err(RateLimitError::InvalidConfig {
                reason: "max_calls must be at least 1".into(),
            });
        }
        if time_window.is_zero() {
            return Err(RateLimitError::InvalidConfig {
                reason: "time_window must be greater than zero".into(),
            });
        }

        Ok(Self {
            max_calls,
            time_window,
            min_delay,
        })
    }

    /// Parse `max_calls/window_ms/min_delay_ms`, e.g. `30/60000/200`
    pub fn parse(spec: &str) -> Result<Self, RateLimitError> {
        let invalid = || RateLimitError::InvalidConfig {
            reason: format!("expected max_calls/window_ms/min_delay_ms, got '{}'", spec),
        };

        let parts: Vec<&str> = spec.split('/').map(str::trim).collect();
        let [max_calls, window_ms, min_delay_ms] = parts.as_slice() else {
            return Err(invalid());
        };

        Self::new(
            max_calls.parse().map_err(|_| invalid())?,
            Duration::from_millis(window_ms.parse().map_err(|_| invalid())?),
            Duration::from_millis(min_delay_ms.parse().map_err(|_| invalid())?),
        )
    }

    /// 10 calls per minute, at least 1s apart
    pub fn dashboard() -> Self {
        Self {
            max_calls: 10,
            time_window: Duration::from_secs(60),
            min_delay: Duration::from_secs(1),
        }
    }

    /// 30 calls per minute, at least 200ms apart
    pub fn inventory() -> Self {
        Self {
            max_calls: 30,
            time_window: Duration::from_secs(60),
            min_delay: Duration::from_millis(200),
        }
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn time_window(&self) -> Duration {
        self.time_window
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }
}

/// Admissions for one key: the trailing window plus the latest admission,
/// which can outlive the window when `min_delay` exceeds it.
#[derive(Debug, Default)]
struct KeyHistory {
    calls: VecDeque<Instant>,
    last_admitted: Option<Instant>,
}

impl KeyHistory {
    /// Drop timestamps that fell out of the trailing window
    fn prune(&mut self, now: Instant, window: Duration) {
        while self
            .calls
            .front()
            .is_some_and(|&oldest| now.duration_since(oldest) >= window)
        {
            self.calls.pop_front();
        }
    }

    /// How long the caller must wait before being admitted, if at all
    fn admission_delay(&self, now: Instant, config: &RateLimitConfig) -> Option<Duration> {
        if self.calls.len() >= config.max_calls {
            let oldest = *self.calls.front()?;
            return Some(config.time_window.saturating_sub(now.duration_since(oldest)));
        }

        let gap = now.duration_since(self.last_admitted?);
        (gap < config.min_delay).then(|| config.min_delay - gap)
    }

    fn admit(&mut self, now: Instant) {
        self.calls.push_back(now);
        self.last_admitted = Some(now);
    }
}

/// Per-key call history and debounce generations
#[derive(Debug, Default)]
pub struct RateLimiter {
    history: Mutex<HashMap<String, KeyHistory>>,
    pending: Mutex<HashMap<String, u64>>,
    generation: AtomicU64,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn history(&self) -> MutexGuard<'_, HashMap<String, KeyHistory>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until `key` may make another call, then record it.
    ///
    /// Re-evaluates after every wait, since other tasks may have been
    /// admitted while this one slept. Only the calling task is delayed.
    pub async fn throttle(&self, key: &str, config: &RateLimitConfig) {
        loop {
            let wait = {
                let mut history = self.history();
                let entry = history.entry(key.to_owned()).or_default();
                let now = Instant::now();
                entry.prune(now, config.time_window);

                match entry.admission_delay(now, config) {
                    None => {
                        entry.admit(now);
                        return;
                    }
                    Some(wait) => wait,
                }
            };

            tracing::debug!(key, ?wait, "Rate limit wait");
            sleep(wait).await;
        }
    }

    /// Run `f` once `delay` has passed without a newer call for `key`.
    ///
    /// A newer call supersedes this one: the superseded caller gets
    /// [`RateLimitError::Superseded`] and its `f` never runs. Errors from
    /// `f` itself are returned unchanged.
    pub async fn debounce<F, Fut, T, E>(&self, key: &str, delay: Duration, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RateLimitError>,
    {
        // Generations are unique per limiter so a finished key never hands
        // an old number back out.
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        if self
            .pending()
            .insert(key.to_owned(), generation)
            .is_some()
        {
            tracing::warn!(key, "Superseding pending debounced call");
        }

        sleep(delay).await;

        let still_latest = {
            let mut pending = self.pending();
            if pending.get(key) == Some(&generation) {
                pending.remove(key);
                true
            } else {
                false
            }
        };

        if !still_latest {
            return Err(RateLimitError::Superseded {
                key: key.to_owned(),
            }
            .into());
        }

        f().await
    }

    /// Forget history for one key, or for every key when `None`
    pub fn clear(&self, key: Option<&str>) {
        let mut history = self.history();
        match key {
            Some(key) => {
                history.remove(key);
            }
            None => history.clear(),
        }
    }

    /// Calls recorded for `key` within the trailing `window`
    pub fn call_count(&self, key: &str, window: Duration) -> usize {
        let now = Instant::now();
        self.history()
            .get(key)
            .map(|entry| {
                entry
                    .calls
                    .iter()
                    .filter(|&&at| now.duration_since(at) < window)
                    .count()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn config(max_calls: usize, window_ms: u64, min_delay_ms: u64) -> RateLimitConfig {
        RateLimitConfig::new(
            max_calls,
            Duration::from_millis(window_ms),
            Duration::from_millis(min_delay_ms),
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(RateLimitConfig::new(0, Duration::from_secs(1), Duration::ZERO).is_err());
        assert!(RateLimitConfig::new(1, Duration::ZERO, Duration::ZERO).is_err());
    }

    #[test]
    fn parses_config() {
        let cfg = RateLimitConfig::parse("30/60000/200").unwrap();
        assert_eq!(cfg, RateLimitConfig::inventory());

        assert!(RateLimitConfig::parse("30/60000").is_err());
        assert!(RateLimitConfig::parse("x/1/1").is_err());
        assert!(RateLimitConfig::parse("0/1000/0").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn admits_up_to_max_immediately() {
        let limiter = RateLimiter::new();
        let cfg = config(3, 1_000, 0);
        let start = Instant::now();

        for _ in 0..3 {
            limiter.throttle(INVENTORY, &cfg).await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.throttle(INVENTORY, &cfg).await;
        assert_eq!(start.elapsed(), Duration::from_millis(1_000));
        assert_eq!(limiter.call_count(INVENTORY, Duration::from_millis(1_000)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn enforces_min_delay() {
        let limiter = RateLimiter::new();
        let cfg = config(10, 10_000, 250);
        let start = Instant::now();

        limiter.throttle(DASHBOARD, &cfg).await;
        tokio::time::advance(Duration::from_millis(100)).await;
        limiter.throttle(DASHBOARD, &cfg).await;

        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn min_delay_longer_than_window() {
        let limiter = RateLimiter::new();
        let cfg = config(1, 50, 261);
        let start = Instant::now();

        limiter.throttle(DASHBOARD, &cfg).await;
        limiter.throttle(DASHBOARD, &cfg).await;

        assert_eq!(start.elapsed(), Duration::from_millis(261));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let limiter = RateLimiter::new();
        let cfg = config(1, 1_000, 0);
        let start = Instant::now();

        limiter.throttle(DASHBOARD, &cfg).await;
        limiter.throttle(INVENTORY, &cfg).await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_stay_within_window() {
        let limiter = Arc::new(RateLimiter::new());
        let cfg = config(2, 1_000, 0);
        let start = Instant::now();

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.throttle(INVENTORY, &cfg).await;
                    Instant::now()
                })
            })
            .collect();

        let mut admitted = Vec::new();
        for handle in handles {
            admitted.push(handle.await.unwrap().duration_since(start));
        }
        admitted.sort();

        assert_eq!(
            admitted,
            vec![
                Duration::ZERO,
                Duration::ZERO,
                Duration::from_millis(1_000),
                Duration::from_millis(1_000),
                Duration::from_millis(2_000),
                Duration::from_millis(2_000),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn clear_resets_history() {
        let limiter = RateLimiter::new();
        let cfg = config(1, 60_000, 0);

        limiter.throttle(DASHBOARD, &cfg).await;
        limiter.throttle(INVENTORY, &cfg).await;
        assert_eq!(limiter.call_count(DASHBOARD, cfg.time_window()), 1);

        limiter.clear(Some(DASHBOARD));
        assert_eq!(limiter.call_count(DASHBOARD, cfg.time_window()), 0);
        assert_eq!(limiter.call_count(INVENTORY, cfg.time_window()), 1);

        let start = Instant::now();
        limiter.throttle(DASHBOARD, &cfg).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.clear(None);
        assert_eq!(limiter.call_count(INVENTORY, cfg.time_window()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn call_count_uses_trailing_window() {
        let limiter = RateLimiter::new();
        let cfg = config(10, 60_000, 0);

        limiter.throttle(DASHBOARD, &cfg).await;
        tokio::time::advance(Duration::from_millis(500)).await;
        limiter.throttle(DASHBOARD, &cfg).await;

        assert_eq!(limiter.call_count(DASHBOARD, Duration::from_millis(400)), 1);
        assert_eq!(limiter.call_count(DASHBOARD, Duration::from_millis(1_000)), 2);
        assert_eq!(limiter.call_count("UNKNOWN", Duration::from_millis(1_000)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_runs_only_latest() {
        let limiter = RateLimiter::new();
        let runs = AtomicUsize::new(0);
        let delay = Duration::from_millis(300);

        let first = limiter.debounce(DASHBOARD, delay, || async {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok::<_, RateLimitError>("first")
        });
        let second = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            limiter
                .debounce(DASHBOARD, delay, || async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, RateLimitError>("second")
                })
                .await
        };

        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first, Err(RateLimitError::Superseded { .. })));
        assert_eq!(second.unwrap(), "second");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_never_reuses_generations() {
        let limiter = RateLimiter::new();
        let runs_c = AtomicUsize::new(0);

        let call = |name: &'static str, start_ms: u64, delay_ms: u64| {
            let limiter = &limiter;
            let runs_c = &runs_c;
            async move {
                tokio::time::sleep(Duration::from_millis(start_ms)).await;
                limiter
                    .debounce(INVENTORY, Duration::from_millis(delay_ms), || async move {
                        if name == "C" {
                            runs_c.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok::<_, RateLimitError>(name)
                    })
                    .await
            }
        };

        // B finishes at 150ms and clears the key before C arrives at 200ms.
        // A wakes at 300ms and must still see itself as stale.
        let (a, b, c) = tokio::join!(call("A", 0, 300), call("B", 100, 50), call("C", 200, 300));

        assert!(matches!(a, Err(RateLimitError::Superseded { .. })));
        assert_eq!(b.unwrap(), "B");
        assert_eq!(c.unwrap(), "C");
        assert_eq!(runs_c.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_propagates_errors() {
        #[derive(Debug, PartialEq)]
        enum TaskError {
            Limiter,
            Failed,
        }

        impl From<RateLimitError> for TaskError {
            fn from(_: RateLimitError) -> Self {
                TaskError::Limiter
            }
        }

        let limiter = RateLimiter::new();
        let result: Result<(), TaskError> = limiter
            .debounce(INVENTORY, Duration::from_millis(50), || async {
                Err(TaskError::Failed)
            })
            .await;

        assert_eq!(result, Err(TaskError::Failed));
    }
}
