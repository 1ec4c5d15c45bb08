//! Logging setup
//!
//! Thin wrapper over tracing-subscriber so embedding services get consistent
//! output. Respects `RUST_LOG` when set.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `default_level` is used when `RUST_LOG` is not set (e.g. "info",
/// "ratelimit_rs=debug"). Safe to call once per process; subsequent calls
/// are ignored.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
