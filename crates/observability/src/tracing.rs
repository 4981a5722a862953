//! Process-wide fallback subscriber.
//!
//! Server start-up, shutdown and anything logged outside an endpoint call
//! land here as JSON lines on stdout. Endpoint calls are routed to their
//! server's [`crate::LogContext`] instead.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// [`init_with`] the [`DEFAULT_DIRECTIVE`].
pub fn init() -> bool {
    init_with(DEFAULT_DIRECTIVE)
}

/// Install the global subscriber, filtered by `RUST_LOG` or else
/// `default_directive`. Returns `false` when a global subscriber exists.
pub fn init_with(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(true)
        .with_target(false)
        .try_init()
        .is_ok()
}
