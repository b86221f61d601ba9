//! Shared helpers for the `mcpshare` integration tests: a scripted
//! executor standing in for the share command, settings builders, and
//! tracing/timeout utilities.

pub mod builders;
pub mod fake_executor;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

static TRACING: Once = Once::new();

/// Upper bound for any single awaited step in a test. Well above the
/// 500 ms startup deadline that `SettingsBuilder` uses by default.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a test-writer subscriber once per test binary.
///
/// Output shows up only for failing tests (or with `--nocapture`). The
/// filter comes from `RUST_LOG`, e.g. `RUST_LOG=mcpshare=debug` to see
/// the classifier's per-line trace; otherwise `info`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, failing the test if it takes longer than [`TEST_TIMEOUT`].
///
/// A hung share start or kill shows up as this panic instead of a stuck
/// test run.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("test step timed out after {TEST_TIMEOUT:?}"))
}
