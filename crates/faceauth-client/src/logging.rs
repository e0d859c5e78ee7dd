//! Logging setup.
//!
//! The client logs through `tracing`.  An embedding application calls
//! [`init_logging`] once at startup, usually with `AppConfig::log_level`.

use tracing_subscriber::EnvFilter;

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (e.g. `"info"`,
/// `"faceauth_client=debug"`) is used.  Returns `false` if a global
/// subscriber was already installed, in which case nothing changes.
pub fn init_logging(default_level: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
