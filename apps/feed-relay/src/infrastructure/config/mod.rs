//! Configuration
//!
//! Environment-driven settings for the relay.

pub mod settings;

pub use settings::{
    ArchiveSettings, ConfigError, DeliverySettings, RelayConfig, ServerSettings, UpstreamSettings,
};
