//! Operation tracing hooks.
//!
//! The retry loop reports each policy decision as a named count. Drivers
//! forward these to whatever metrics sink the application uses; the default
//! one only logs them.

use std::time::Duration;

/// Count name for a retry the policy allowed.
pub const RETRIES_ALLOWED: &str = "retries-allowed";

/// Count name for a retry the policy refused.
pub const RETRIES_DISALLOWED: &str = "retries-disallowed";

/// Sink for named timings and counters.
pub trait TracerDriver: Send + Sync {
    /// Record that the operation `name` took `elapsed`.
    fn add_time(&self, name: &str, elapsed: Duration);

    /// Add `increment` to the counter `name`.
    fn add_count(&self, name: &str, increment: i32);
}

/// Driver that emits every measurement as a `trace` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracerDriver;

impl TracerDriver for LogTracerDriver {
    fn add_time(&self, name: &str, elapsed: Duration) {
        tracing::trace!(metric = name, elapsed = ?elapsed, "trace time");
    }

    fn add_count(&self, name: &str, increment: i32) {
        tracing::trace!(metric = name, increment, "trace count");
    }
}
