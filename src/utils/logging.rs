//! Process-wide `tracing` setup for the binary and tests.

use tracing_subscriber::EnvFilter;

/// Builds the event filter: `RUST_LOG` when it is set and parses, otherwise
/// `level`, which may be a bare level (`debug`) or a directive list
/// (`nsq_bus=debug,warn`). Anything unparsable falls back to `info`.
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.trim()))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the fmt subscriber. Returns `false` when one is already installed.
pub fn init(level: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_target(false)
        .try_init()
        .is_ok()
}
