//! Diagnostic logging setup for the binary.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! caller's job. Logs go to stderr because stdout carries the JSON envelope.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter directives, e.g. `dropship=debug,dropship::audit=info`.
pub const LOG_ENV: &str = "DROPSHIP_LOG";
/// `json` switches to one JSON object per line.
pub const LOG_FORMAT_ENV: &str = "DROPSHIP_LOG_FORMAT";

const DEFAULT_LEVEL: &str = "warn";

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));
    let format = std::env::var(LOG_FORMAT_ENV).unwrap_or_default();

    let log_layer = match format.to_lowercase().as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(version = env!("CARGO_PKG_VERSION"), format = %format, "logging initialized");
    }
}
