//! Logging for RestKit servers.
//!
//! Two levels: [`tracing::init`] installs the process-wide JSON subscriber
//! that catches everything logged outside a server, and [`LogContext`] gives
//! each server its own file and stderr stream that its endpoints log into.

pub mod logging;
pub mod tracing;

pub use logging::{LogContext, LogError};

/// Install the process-wide subscriber. Returns `false` if one was already set.
pub fn init() -> bool {
    tracing::init()
}
