use std::sync::Once;

use std::error::Error;

use tracing_subscriber::EnvFilter;

static INIT_TEST_TRACING: Once = Once::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes the global tracing subscriber for a binary.
///
/// The filter honors `RUST_LOG` and defaults to `info`.
pub fn init_tracing() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .try_init()
}

/// Initializes tracing for tests.
///
/// Safe to call from every test; initialization happens once per process and
/// output is routed through the test writer so it interleaves with test
/// captures.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_test_writer()
            .try_init();
    });
}
