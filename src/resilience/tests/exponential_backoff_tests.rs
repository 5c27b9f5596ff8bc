// src/resilience/tests/exponential_backoff_tests.rs

use crate::resilience::{ExponentialBackoff, RetryConfig};
use std::time::Duration;

fn fixed(max_attempts: usize, initial: Duration, max: Duration, multiplier: f64) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_backoff: initial,
        max_backoff: max,
        backoff_multiplier: multiplier,
        use_jitter: false, // Disable jitter for deterministic testing
    }
}

#[test]
fn test_backoff_increases_exponentially() {
    let mut backoff = ExponentialBackoff::new(fixed(
        4,
        Duration::from_millis(1),
        Duration::from_secs(1),
        2.0,
    ));

    assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(1)));
    assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(2)));
    assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(4)));
    assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(8)));
    assert_eq!(backoff.attempts(), 4);

    // Budget exhausted
    assert_eq!(backoff.next_backoff(), None);
    assert_eq!(backoff.attempts(), 4);
}

#[test]
fn test_backoff_respects_max_backoff() {
    let mut backoff = ExponentialBackoff::new(fixed(
        5,
        Duration::from_micros(400),
        Duration::from_millis(1),
        2.0,
    ));

    assert_eq!(backoff.next_backoff(), Some(Duration::from_micros(400)));
    assert_eq!(backoff.next_backoff(), Some(Duration::from_micros(800)));
    // 1600us capped at 1ms
    assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(1)));
    assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(1)));
}

#[test]
fn test_jitter_stays_within_half_to_full() {
    let mut backoff = ExponentialBackoff::new(RetryConfig {
        use_jitter: true,
        ..fixed(3, Duration::from_millis(10), Duration::from_secs(1), 2.0)
    });

    let first = backoff.next_backoff().unwrap();
    assert!(first >= Duration::from_millis(5) && first <= Duration::from_millis(10));

    let second = backoff.next_backoff().unwrap();
    assert!(second >= Duration::from_millis(10) && second <= Duration::from_millis(20));
}

#[test]
fn test_reset_restarts_backoff_sequence() {
    let mut backoff = ExponentialBackoff::new(fixed(
        2,
        Duration::from_millis(1),
        Duration::from_secs(1),
        3.0,
    ));

    assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(1)));
    assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(3)));
    assert_eq!(backoff.next_backoff(), None);

    backoff.reset();
    assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(1)));
}

#[test]
fn test_zero_attempts_never_retries() {
    let mut backoff = ExponentialBackoff::new(fixed(
        0,
        Duration::from_millis(1),
        Duration::from_secs(1),
        2.0,
    ));
    assert_eq!(backoff.next_backoff(), None);
}

#[test]
fn test_contention_preset_is_short() {
    let config = RetryConfig::contention();
    assert!(config.use_jitter);
    assert!(config.max_backoff <= Duration::from_millis(50));

    let mut backoff = ExponentialBackoff::new(config);
    let mut total = Duration::ZERO;
    while let Some(delay) = backoff.next_backoff() {
        total += delay;
    }
    assert!(total < Duration::from_secs(2));
}
