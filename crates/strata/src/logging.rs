//! Tracing setup for test binaries.
//!
//! The engine only emits `tracing` events; installing a subscriber is left to
//! the harness. These helpers cover the common case. `RUST_LOG` wins over the
//! default filter, and a second call is a no-op.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "strata=info";

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install a human-readable subscriber
///
/// Returns `false` when a global subscriber was already set.
pub fn init_tracing(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_target(true)
        .with_test_writer()
        .try_init()
        .is_ok()
}

/// Install a JSON subscriber, one event per line
///
/// Returns `false` when a global subscriber was already set.
pub fn init_tracing_json(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(default_filter))
        .with_current_span(true)
        .try_init()
        .is_ok()
}
