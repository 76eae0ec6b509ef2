//! Tracing subscriber setup for binaries and demos

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (e.g. `"info"` or `"trafficwatch=debug"`).
///
/// Returns `false` when a global subscriber is already installed; the existing
/// one is left in place.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}
