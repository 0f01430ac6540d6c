//! Test log output.
//!
//! Doubles trace every call and reply at `debug`. Nothing is printed unless a
//! test installs a subscriber, so call [`init_test_tracing`] first when a
//! failing test needs the call history.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

const DEFAULT_FILTER: &str = "info,keeper_harness=debug";

/// Route tracing output to the test writer.
///
/// Honors `RUST_LOG`, defaulting to `info` plus `debug` for the doubles.
/// Only the first call in a process has any effect.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        install(filter);
    });
}

/// Like [`init_test_tracing`] with an explicit filter directive.
pub fn init_test_tracing_with_filter(filter: &str) {
    INIT.call_once(|| install(EnvFilter::new(filter)));
}

fn install(filter: EnvFilter) {
    // Another subscriber may already be global; the doubles log to it instead.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer().compact())
        .try_init();
}
