//! Canonical Event Model
//!
//! Transport-agnostic representation of a market update. Every message a
//! subscriber receives, whether it originated from the real upstream feed
//! or from the synthetic generator, is one of these, JSON-encoded and
//! tagged by a `type` field.
//!
//! # Wire Format
//!
//! ```json
//! {"type":"ticker","timestamp":"2023-11-14T22:13:20Z","exchange":"OKX",
//!  "symbol":"BTC-USDT-SWAP","price":45000.5,"high24h":45100.0,
//!  "low24h":44800.0,"volume24h":1234.5,"change24h":0.42,
//!  "ask":{"price":45000.6,"size":1.2},"bid":{"price":45000.4,"size":0.8},
//!  "latencyMs":0.13}
//! {"type":"trade","timestamp":"2023-11-14T22:13:20Z","price":45000.5,
//!  "size":0.01,"side":"buy"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    /// Aggressor bought.
    Buy,
    /// Aggressor sold.
    Sell,
}

impl TradeSide {
    /// Get the lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// One side of the best book: a price and the size resting at it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    /// Price of the level.
    pub price: f64,
    /// Size resting at the level.
    pub size: f64,
}

/// Normalized 24h market snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerEvent {
    /// When the relay observed this snapshot.
    pub timestamp: DateTime<Utc>,
    /// Source exchange name.
    pub exchange: String,
    /// Instrument identifier.
    pub symbol: String,
    /// Last traded price.
    pub price: f64,
    /// Highest price over the trailing 24h.
    #[serde(rename = "high24h")]
    pub high_24h: f64,
    /// Lowest price over the trailing 24h.
    #[serde(rename = "low24h")]
    pub low_24h: f64,
    /// Traded volume over the trailing 24h.
    #[serde(rename = "volume24h")]
    pub volume_24h: f64,
    /// Percent change of the last price versus the 24h open.
    #[serde(rename = "change24h")]
    pub change_24h: f64,
    /// Best ask level.
    pub ask: BookLevel,
    /// Best bid level.
    pub bid: BookLevel,
    /// Relay-side processing latency in milliseconds.
    #[serde(rename = "latencyMs")]
    pub latency_ms: f64,
}

/// Normalized single trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Upstream trade time (exchange-reported, converted to UTC).
    pub timestamp: DateTime<Utc>,
    /// Trade price.
    pub price: f64,
    /// Trade size.
    pub size: f64,
    /// Trade side.
    pub side: TradeSide,
}

/// A normalized market update, tagged on the wire by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CanonicalEvent {
    /// 24h market snapshot.
    Ticker(TickerEvent),
    /// Single trade.
    Trade(TradeEvent),
}

impl CanonicalEvent {
    /// Event kind label, used for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ticker(_) => "ticker",
            Self::Trade(_) => "trade",
        }
    }
}
