// src/resilience/tests/mod.rs

mod exponential_backoff_tests;
