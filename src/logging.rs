use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Ensure initialization happens only once
static INIT: Once = Once::new();

/// Initialize the logging system with sensible defaults.
///
/// Log level can be set using the RUST_LOG environment variable.
/// Example: RUST_LOG=debug,premier=trace
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true) // Useful for debugging concurrency issues
                    .with_line_number(true),
            )
            .try_init();

        // Another subscriber may already be installed by the host application
        if installed.is_ok() {
            tracing::info!("Logging initialized");
        }
    });
}

/// Macro for logging admission decisions
#[macro_export]
macro_rules! throttle_event {
    ($key:expr, $algorithm:expr, $allowed:expr, $quota:expr, $duration:expr) => {
        tracing::debug!(
            key = $key,
            algorithm = %$algorithm,
            allowed = $allowed,
            quota = $quota,
            duration_seconds = $duration,
            "Throttle decision"
        )
    };
}

/// Macro for logging counter store operations with timing
#[macro_export]
macro_rules! storage_op {
    ($operation:expr, $key:expr, $result:expr, $elapsed_ms:expr) => {
        tracing::trace!(
            operation = $operation,
            key = $key,
            success = $result.is_ok(),
            elapsed_ms = $elapsed_ms,
            "Storage operation"
        )
    };
}
