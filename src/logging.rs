//! C11: structured logging setup (ambient). One call at the top of `main`,
//! before any other component starts.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global `tracing` subscriber. `RUST_LOG` controls
/// verbosity per the usual `tracing_subscriber` filter syntax; `info` is
/// the default when unset.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(true).init();
}
