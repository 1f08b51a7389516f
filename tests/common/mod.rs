//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Once;

use cellbtree::{IndexConfig, Rid};

static TRACING: Once = Once::new();

/// Route engine logs to the test output; filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Small pages so that a few dozen keys already build a multi-level tree.
pub fn small_config() -> IndexConfig {
    IndexConfig::default()
        .with_page_size(256)
        .with_max_key_size(32)
        .with_prefetch_size(4)
        .with_sync_on_commit(false)
}

pub fn rid(n: i64) -> Rid {
    Rid::new((n % 7) as i16, n)
}
