use std::time::Duration;

use dealerlot_core::{RateLimitConfig, RateLimiter};
use proptest::prelude::*;
use tokio::time::Instant;

/// Run `gaps` through the limiter on a paused clock and return the instant
/// each call was admitted.
fn admissions(config: RateLimitConfig, gaps: &[u64]) -> Vec<Instant> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();

    runtime.block_on(async {
        let limiter = RateLimiter::new();
        let mut admitted = Vec::with_capacity(gaps.len());

        for &gap in gaps {
            tokio::time::advance(Duration::from_millis(gap)).await;
            limiter.throttle("INVENTORY", &config).await;
            admitted.push(Instant::now());
        }

        admitted
    })
}

fn arb_config() -> impl Strategy<Value = RateLimitConfig> {
    (1usize..6, 50u64..2_000, 0u64..300).prop_map(|(max_calls, window_ms, min_delay_ms)| {
        RateLimitConfig::new(
            max_calls,
            Duration::from_millis(window_ms),
            Duration::from_millis(min_delay_ms),
        )
        .unwrap()
    })
}

proptest! {
    /// Property: no trailing window ever holds more than max_calls admissions
    #[test]
    fn prop_window_never_exceeds_max(
        config in arb_config(),
        gaps in prop::collection::vec(0u64..500, 1..40),
    ) {
        let admitted = admissions(config, &gaps);

        for (i, &end) in admitted.iter().enumerate() {
            let in_window = admitted[..=i]
                .iter()
                .filter(|&&at| end.duration_since(at) < config.time_window())
                .count();
            prop_assert!(in_window <= config.max_calls());
        }
    }

    /// Property: consecutive admissions are at least min_delay apart
    #[test]
    fn prop_consecutive_calls_respect_min_delay(
        config in arb_config(),
        gaps in prop::collection::vec(0u64..500, 2..40),
    ) {
        prop_assume!(!config.min_delay().is_zero());
        let admitted = admissions(config, &gaps);

        for pair in admitted.windows(2) {
            prop_assert!(pair[1].duration_since(pair[0]) >= config.min_delay());
        }
    }

    /// Property: admissions keep call order and no call is dropped
    #[test]
    fn prop_every_call_is_admitted(
        config in arb_config(),
        gaps in prop::collection::vec(0u64..500, 1..40),
    ) {
        let admitted = admissions(config, &gaps);

        prop_assert_eq!(admitted.len(), gaps.len());
        prop_assert!(admitted.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
