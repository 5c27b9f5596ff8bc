// src/tests/mod.rs

mod throttler_tests;
