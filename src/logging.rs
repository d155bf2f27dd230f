//! Logging setup for hosts embedding the engine.
//!
//! Console output only, configurable via the `RUST_LOG` environment
//! variable. Hosts with their own subscriber can skip this entirely;
//! the engine only emits `tracing` events and never installs a
//! subscriber on its own.

use tracing_subscriber::EnvFilter;

/// Initialize console logging.
///
/// Defaults to INFO when `RUST_LOG` is not set. Safe to call more than
/// once; later calls are no-ops because the global subscriber can only
/// be installed once per process.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}
