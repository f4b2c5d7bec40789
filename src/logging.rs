//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events; the embedding application
//! decides whether to install a subscriber. [`init`] is the convenience for
//! callers that want the configured defaults.

use std::io;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Install a stderr `fmt` subscriber filtered by `config.level`.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// when a global subscriber was already installed, in which case nothing
/// changes.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("memdex={}", config.level)));

    fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(false)
        .try_init()
        .is_ok()
}
