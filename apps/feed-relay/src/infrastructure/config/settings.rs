//! Relay Configuration Settings
//!
//! Configuration types for the feed relay, loaded from environment
//! variables. Every knob has a default matching the production OKX feed, so
//! the binary runs with no environment at all.

use std::time::Duration;

use crate::infrastructure::okx::backoff::BackoffConfig;
use crate::infrastructure::okx::session::{
    DEFAULT_FEED_URL, DEFAULT_INSTRUMENT, FeedSessionConfig,
};
use crate::infrastructure::okx::simulator::SimulatorConfig;

/// Upstream connection settings.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Upstream WebSocket URL.
    pub url: String,
    /// Instrument to subscribe to.
    pub instrument: String,
    /// Bound on one connect attempt.
    pub connect_timeout: Duration,
    /// Interval between keepalive pings.
    pub ping_interval: Duration,
    /// Idle period after which the connection counts as dropped.
    pub idle_timeout: Duration,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            instrument: DEFAULT_INSTRUMENT.to_string(),
            connect_timeout: Duration::from_secs(30),
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// HTTP port serving the API, health surface, and downstream WebSocket.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 5000 }
    }
}

/// Archive settings.
#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    /// Whether archiving is enabled.
    pub enabled: bool,
    /// Data directory for the JSONL archive.
    pub data_dir: String,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: "data".to_string(),
        }
    }
}

/// Downstream delivery settings.
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    /// Per-subscriber outbound queue depth. A subscriber that falls this
    /// many frames behind is dropped.
    pub subscriber_buffer: usize,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            subscriber_buffer: 256,
        }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Upstream connection settings.
    pub upstream: UpstreamSettings,
    /// Backoff policy settings.
    pub backoff: BackoffConfig,
    /// Synthetic generator settings.
    pub simulator: SimulatorConfig,
    /// Server port settings.
    pub server: ServerSettings,
    /// Archive settings.
    pub archive: ArchiveSettings,
    /// Downstream delivery settings.
    pub delivery: DeliverySettings,
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when the feed URL has an unsupported scheme or the
    /// instrument is empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let upstream = UpstreamSettings {
            url: parse_env_string("OKX_WS_URL", &UpstreamSettings::default().url),
            instrument: parse_env_string(
                "FEED_RELAY_INSTRUMENT",
                &UpstreamSettings::default().instrument,
            ),
            connect_timeout: parse_env_duration_secs(
                "FEED_RELAY_CONNECT_TIMEOUT_SECS",
                UpstreamSettings::default().connect_timeout,
            ),
            ping_interval: parse_env_duration_secs(
                "FEED_RELAY_PING_INTERVAL_SECS",
                UpstreamSettings::default().ping_interval,
            ),
            idle_timeout: parse_env_duration_secs(
                "FEED_RELAY_IDLE_TIMEOUT_SECS",
                UpstreamSettings::default().idle_timeout,
            ),
        };

        if !(upstream.url.starts_with("ws://") || upstream.url.starts_with("wss://")) {
            return Err(ConfigError::InvalidUrl(upstream.url));
        }
        if upstream.instrument.is_empty() {
            return Err(ConfigError::EmptyValue("FEED_RELAY_INSTRUMENT".to_string()));
        }

        let backoff = BackoffConfig {
            base_delay: parse_env_duration_secs(
                "FEED_RELAY_BACKOFF_BASE_SECS",
                BackoffConfig::default().base_delay,
            ),
            max_delay: parse_env_duration_secs(
                "FEED_RELAY_BACKOFF_MAX_SECS",
                BackoffConfig::default().max_delay,
            ),
            simulate_threshold: parse_env_duration_secs(
                "FEED_RELAY_SIMULATE_AFTER_SECS",
                BackoffConfig::default().simulate_threshold,
            ),
        };

        let simulator = SimulatorConfig {
            initial_price: parse_env_f64(
                "FEED_RELAY_SIM_INITIAL_PRICE",
                SimulatorConfig::default().initial_price,
            ),
            volatility: parse_env_f64(
                "FEED_RELAY_SIM_VOLATILITY",
                SimulatorConfig::default().volatility,
            ),
            tick_interval: parse_env_duration_millis(
                "FEED_RELAY_SIM_TICK_INTERVAL_MS",
                SimulatorConfig::default().tick_interval,
            ),
            trade_probability: parse_env_f64(
                "FEED_RELAY_SIM_TRADE_PROBABILITY",
                SimulatorConfig::default().trade_probability,
            ),
        };

        let server = ServerSettings {
            http_port: parse_env_u16("FEED_RELAY_HTTP_PORT", ServerSettings::default().http_port),
        };

        let archive = ArchiveSettings {
            enabled: parse_env_bool(
                "FEED_RELAY_ARCHIVE_ENABLED",
                ArchiveSettings::default().enabled,
            ),
            data_dir: parse_env_string(
                "FEED_RELAY_ARCHIVE_DIR",
                &ArchiveSettings::default().data_dir,
            ),
        };

        let delivery = DeliverySettings {
            subscriber_buffer: parse_env_usize(
                "FEED_RELAY_SUBSCRIBER_BUFFER",
                DeliverySettings::default().subscriber_buffer,
            ),
        };

        Ok(Self {
            upstream,
            backoff,
            simulator,
            server,
            archive,
            delivery,
        })
    }

    /// Build the feed session configuration from these settings.
    #[must_use]
    pub fn session_config(&self) -> FeedSessionConfig {
        FeedSessionConfig {
            url: self.upstream.url.clone(),
            instrument: self.upstream.instrument.clone(),
            connect_timeout: self.upstream.connect_timeout,
            ping_interval: self.upstream.ping_interval,
            idle_timeout: self.upstream.idle_timeout,
            backoff: self.backoff.clone(),
            simulator: self.simulator.clone(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The feed URL is not a WebSocket URL.
    #[error("OKX_WS_URL must start with ws:// or wss://, got {0:?}")]
    InvalidUrl(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |v| {
            matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
        })
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
