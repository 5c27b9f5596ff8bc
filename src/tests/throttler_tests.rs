// src/tests/throttler_tests.rs

use std::sync::Arc;
use std::time::Duration;
use tracing_test::traced_test;

use crate::algorithms::Algorithm;
use crate::clock::MockClock;
use crate::config::ThrottlerConfig;
use crate::error::ThrottleError;
use crate::storage::{CounterStore, MemoryCounter};
use crate::test_utils::{assert_close, async_throttler, blocking_throttler, T0};
use crate::throttler::BlockingThrottler;

const KEY: &str = "premier:fixed_window:app:send";

#[test]
fn test_unconfigured_throttler_is_not_ready() {
    let throttler = BlockingThrottler::new();
    assert!(!throttler.is_ready());

    assert!(matches!(throttler.keyspace(), Err(ThrottleError::NotReady)));
    assert!(matches!(
        throttler.check_and_consume(KEY, Algorithm::FixedWindow, 1, 1),
        Err(ThrottleError::NotReady)
    ));
    assert!(matches!(
        throttler.schedule(KEY, 1, 1, 1),
        Err(ThrottleError::NotReady)
    ));
    assert!(matches!(throttler.clear(), Err(ThrottleError::NotReady)));
}

#[test]
fn test_configure_makes_ready() {
    let clock = MockClock::new(T0);
    let (throttler, _) = blocking_throttler(&clock, ThrottlerConfig::default());

    assert!(throttler.is_ready());
    assert_eq!(throttler.keyspace().unwrap(), "premier");
    assert_eq!(throttler.default_algorithm().unwrap(), Algorithm::FixedWindow);
}

#[test]
fn test_quota_exceeded_carries_wait() {
    let clock = MockClock::new(T0);
    let (throttler, _) = blocking_throttler(&clock, ThrottlerConfig::default());

    for _ in 0..3 {
        let status = throttler
            .check_and_consume(KEY, Algorithm::FixedWindow, 3, 10)
            .unwrap();
        assert!(status.allowed);
    }

    clock.advance(Duration::from_secs(2));
    match throttler.check_and_consume(KEY, Algorithm::FixedWindow, 3, 10) {
        Err(ThrottleError::QuotaExceeded {
            quota,
            duration,
            remaining,
        }) => {
            assert_eq!(quota, 3);
            assert_eq!(duration, 10);
            assert_close(remaining, 8.0);
        }
        other => panic!("expected QuotaExceeded, got {:?}", other),
    }
}

#[test]
fn test_token_bucket_scenario() {
    let clock = MockClock::new(T0);
    let (throttler, _) = blocking_throttler(&clock, ThrottlerConfig::default());
    let key = "premier:token_bucket:app:upload";

    for _ in 0..5 {
        throttler
            .check_and_consume(key, Algorithm::TokenBucket, 5, 5)
            .unwrap();
    }
    let err = throttler
        .check_and_consume(key, Algorithm::TokenBucket, 5, 5)
        .unwrap_err();
    let wait = err.retry_after().unwrap();
    assert_close(wait.as_secs_f64(), 1.0);

    clock.advance(wait);
    assert!(throttler
        .check_and_consume(key, Algorithm::TokenBucket, 5, 5)
        .is_ok());
}

#[test]
fn test_leaky_bucket_scenario() {
    let clock = MockClock::new(T0);
    let (throttler, _) = blocking_throttler(&clock, ThrottlerConfig::default());
    let key = "premier:leaky_bucket:app:notify";

    let first = throttler.schedule(key, 2, 1, 1).unwrap();
    let second = throttler.schedule(key, 2, 1, 1).unwrap();
    assert_eq!(first.delay, Duration::ZERO);
    assert_eq!(second.delay, Duration::from_secs(1));
    assert_eq!(second.position, 1);

    assert!(matches!(
        throttler.schedule(key, 2, 1, 1),
        Err(ThrottleError::CapacityExceeded { bucket_size: 2 })
    ));

    clock.advance(Duration::from_secs(1));
    assert!(throttler.schedule(key, 2, 1, 1).is_ok());
}

#[test]
fn test_invalid_parameters_are_config_errors() {
    let clock = MockClock::new(T0);
    let (throttler, _) = blocking_throttler(&clock, ThrottlerConfig::default());

    for (quota, duration) in [(0, 10), (3, 0)] {
        assert!(matches!(
            throttler.check_and_consume(KEY, Algorithm::FixedWindow, quota, duration),
            Err(ThrottleError::Config(_))
        ));
    }
    assert!(matches!(
        throttler.schedule(KEY, 0, 1, 1),
        Err(ThrottleError::Config(_))
    ));
    // The leaky bucket only queues
    assert!(matches!(
        throttler.check_and_consume(KEY, Algorithm::LeakyBucket, 1, 1),
        Err(ThrottleError::Config(_))
    ));
}

#[test]
fn test_clear_scoped_to_keyspace() {
    let clock = MockClock::new(T0);
    let (throttler, store) = blocking_throttler(&clock, ThrottlerConfig::default());

    throttler
        .check_and_consume(KEY, Algorithm::FixedWindow, 1, 60)
        .unwrap();
    assert!(throttler
        .check_and_consume(KEY, Algorithm::FixedWindow, 1, 60)
        .is_err());
    store.set("unrelated:key", "keep").unwrap();

    throttler.clear().unwrap();

    assert!(throttler
        .check_and_consume(KEY, Algorithm::FixedWindow, 1, 60)
        .is_ok());
    assert_eq!(store.get("unrelated:key").unwrap().as_deref(), Some("keep"));

    throttler.clear_all().unwrap();
    assert!(store.is_empty());
}

#[test]
fn test_clear_leaves_sibling_keyspace() {
    let clock = MockClock::new(T0);
    let store = MemoryCounter::default();

    let first = BlockingThrottler::with_clock(Arc::new(clock.clone()));
    first.configure(Arc::new(store.clone()), ThrottlerConfig::new("premier", Algorithm::FixedWindow));
    let second = BlockingThrottler::with_clock(Arc::new(clock.clone()));
    second.configure(Arc::new(store.clone()), ThrottlerConfig::new("premier2", Algorithm::FixedWindow));

    let second_key = "premier2:fixed_window:app:send";
    second
        .check_and_consume(second_key, Algorithm::FixedWindow, 1, 60)
        .unwrap();
    first
        .check_and_consume(KEY, Algorithm::FixedWindow, 1, 60)
        .unwrap();

    first.clear().unwrap();

    assert!(matches!(
        second.check_and_consume(second_key, Algorithm::FixedWindow, 1, 60),
        Err(ThrottleError::QuotaExceeded { .. })
    ));
    assert!(first
        .check_and_consume(KEY, Algorithm::FixedWindow, 1, 60)
        .is_ok());
}

#[test]
fn test_reconfigure_switches_store() {
    let clock = MockClock::new(T0);
    let (throttler, old_store) = blocking_throttler(&clock, ThrottlerConfig::default());
    throttler
        .check_and_consume(KEY, Algorithm::FixedWindow, 1, 60)
        .unwrap();

    let new_store = MemoryCounter::default();
    throttler.configure(
        Arc::new(new_store.clone()),
        ThrottlerConfig::new("fresh", Algorithm::SlidingWindow),
    );

    assert_eq!(throttler.keyspace().unwrap(), "fresh");
    assert_eq!(throttler.default_algorithm().unwrap(), Algorithm::SlidingWindow);

    // The old record no longer applies
    assert!(throttler
        .check_and_consume(KEY, Algorithm::FixedWindow, 1, 60)
        .is_ok());
    assert_eq!(old_store.len(), 1);
    assert_eq!(new_store.len(), 1);
}

#[traced_test]
#[test]
fn test_decisions_are_logged() {
    let clock = MockClock::new(T0);
    let (throttler, _) = blocking_throttler(&clock, ThrottlerConfig::default());

    throttler
        .check_and_consume(KEY, Algorithm::FixedWindow, 1, 60)
        .unwrap();
    let _ = throttler.schedule("premier:leaky_bucket:app:x", 1, 1, 60);
    let _ = throttler.schedule("premier:leaky_bucket:app:x", 1, 1, 60);

    assert!(logs_contain("Throttler configured"));
    assert!(logs_contain("Throttle decision"));
    assert!(logs_contain("Leaky bucket overflow"));
}

#[tokio::test]
async fn test_async_throttler() {
    let clock = MockClock::new(T0);
    let (throttler, _) = async_throttler(&clock, ThrottlerConfig::default());

    let calls = (0..10).map(|_| throttler.check_and_consume(KEY, Algorithm::SlidingWindow, 4, 10));
    let results = futures::future::join_all(calls).await;

    let admitted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(admitted, 4);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(ThrottleError::is_throttled));

    let ticket = throttler
        .schedule("premier:leaky_bucket:app:a", 1, 1, 5)
        .await
        .unwrap();
    assert_eq!(ticket.delay, Duration::ZERO);
    assert!(matches!(
        throttler.schedule("premier:leaky_bucket:app:a", 1, 1, 5).await,
        Err(ThrottleError::CapacityExceeded { bucket_size: 1 })
    ));

    throttler.clear().await.unwrap();
    assert!(throttler
        .schedule("premier:leaky_bucket:app:a", 1, 1, 5)
        .await
        .is_ok());
}
