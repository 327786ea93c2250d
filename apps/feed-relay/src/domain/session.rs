//! Feed Session States
//!
//! The connection lifecycle of the single upstream feed session. Exactly one
//! state exists per session; the session task is its only writer and
//! publishes changes through a watch channel.

use serde::Serialize;

/// Lifecycle state of the upstream feed session.
///
/// `Simulating` is sticky: once the session has fallen back to the synthetic
/// generator it does not attempt to re-establish the real feed. The only exit
/// is a stop, which lands in `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No connection and no work in flight.
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Connected and subscribed to the upstream feed.
    Connected,
    /// Waiting out a backoff delay before the next attempt.
    ReconnectWait,
    /// Serving synthetic data; the upstream is no longer retried.
    Simulating,
}

impl SessionState {
    /// Lowercase state name for logs and the health surface.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::ReconnectWait => "reconnect_wait",
            Self::Simulating => "simulating",
        }
    }

    /// Whether an upstream connection handle currently exists.
    #[must_use]
    pub const fn is_upstream_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether events are currently being delivered to subscribers,
    /// real or synthetic.
    #[must_use]
    pub const fn is_delivering(self) -> bool {
        matches!(self, Self::Connected | Self::Simulating)
    }
}
