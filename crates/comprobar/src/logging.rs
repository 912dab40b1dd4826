//! Diagnostic tracing for runs.
//!
//! The engine logs through `tracing` at `debug`/`trace` for run structure and
//! `warn` for context failures. Report output is the [`Reporter`]'s job; this
//! module only installs a subscriber for people debugging a run.
//!
//! [`Reporter`]: crate::Reporter

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a stderr subscriber filtered by `RUST_LOG`, defaulting to `warn`.
///
/// Returns `false` when a global subscriber is already installed.
///
/// ```bash
/// RUST_LOG=comprobar=debug cargo test
/// ```
pub fn init() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .is_ok()
}
