use std::time::Duration;

/// Configuration for retry strategy
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_attempts: usize,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Whether to add jitter to backoff
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::contention()
    }
}

impl RetryConfig {
    /// Short, jittered retries for lost compare-and-set races
    pub fn contention() -> Self {
        Self {
            max_attempts: 32,
            initial_backoff: Duration::from_micros(200),
            max_backoff: Duration::from_millis(50),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

/// Exponential backoff implementation for retries
#[derive(Debug)]
pub struct ExponentialBackoff {
    /// Current attempt number
    current_attempt: usize,
    config: RetryConfig,
}

impl ExponentialBackoff {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            current_attempt: 0,
            config,
        }
    }

    /// Number of backoffs handed out so far
    pub fn attempts(&self) -> usize {
        self.current_attempt
    }

    /// Get the next backoff duration, or None if max attempts reached
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.current_attempt >= self.config.max_attempts {
            return None;
        }
        self.current_attempt += 1;

        let exp = self.current_attempt as f64 - 1.0;
        let base_us = self.config.initial_backoff.as_micros() as f64;
        let backoff_us = base_us * self.config.backoff_multiplier.powf(exp);
        let max_us = self.config.max_backoff.as_micros() as f64;
        let capped_us = backoff_us.min(max_us);

        let jittered_us = if self.config.use_jitter {
            // Random value between 50% and 100% of the calculated backoff
            let jitter = rand::random::<f64>() * 0.5 + 0.5;
            (capped_us * jitter) as u64
        } else {
            capped_us as u64
        };

        Some(Duration::from_micros(jittered_us))
    }

    /// Reset the backoff to start from the beginning
    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}
