//! Tracing Initialization
//!
//! Configures the global `tracing` subscriber for the relay.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log filter (default: `info`)
//! - `LOG_FORMAT`: Set to `json` for machine-readable output
//!
//! # Usage
//!
//! ```ignore
//! use feed_relay::infrastructure::telemetry;
//!
//! // Initialize once at startup
//! telemetry::init();
//! ```

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Safe to call more than once; subsequent calls are no-ops, which keeps
/// test binaries that initialize eagerly from panicking.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let result = if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}
