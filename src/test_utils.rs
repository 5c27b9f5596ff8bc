// src/test_utils.rs

use std::sync::Arc;

use crate::algorithms::{Algorithm, Engine};
use crate::clock::MockClock;
use crate::config::ThrottlerConfig;
use crate::storage::{AsyncCounterStore, CounterStore, MemoryCounter};
use crate::throttler::{AsyncThrottler, BlockingThrottler};

/// Arbitrary non-zero starting time so tests don't depend on timestamp zero
pub const T0: f64 = 1_000.0;

/// Engine over a fresh in-memory store; the store handle shares its map
pub fn blocking_engine(
    algorithm: Algorithm,
    clock: &MockClock,
) -> (Engine<dyn CounterStore>, MemoryCounter) {
    let store = MemoryCounter::default();
    let shared: Arc<dyn CounterStore> = Arc::new(store.clone());
    (Engine::new(algorithm, shared, Arc::new(clock.clone())), store)
}

pub fn async_engine(
    algorithm: Algorithm,
    clock: &MockClock,
) -> (Engine<dyn AsyncCounterStore>, MemoryCounter) {
    let store = MemoryCounter::default();
    let shared: Arc<dyn AsyncCounterStore> = Arc::new(store.clone());
    (Engine::new(algorithm, shared, Arc::new(clock.clone())), store)
}

/// Configured blocking throttler over a mock clock and in-memory store
pub fn blocking_throttler(
    clock: &MockClock,
    config: ThrottlerConfig,
) -> (Arc<BlockingThrottler>, MemoryCounter) {
    let store = MemoryCounter::default();
    let throttler = BlockingThrottler::with_clock(Arc::new(clock.clone()));
    throttler.configure(Arc::new(store.clone()), config);
    (Arc::new(throttler), store)
}

/// Configured async throttler over a mock clock and in-memory store
pub fn async_throttler(
    clock: &MockClock,
    config: ThrottlerConfig,
) -> (Arc<AsyncThrottler>, MemoryCounter) {
    let store = MemoryCounter::default();
    let throttler = AsyncThrottler::with_clock(Arc::new(clock.clone()));
    throttler.configure(Arc::new(store.clone()), config);
    (Arc::new(throttler), store)
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {} to be close to {}",
        actual,
        expected
    );
}
