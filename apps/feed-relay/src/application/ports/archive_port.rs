//! Archive Port (Driven Port)
//!
//! Interface for archiving accepted feed messages. This is a
//! secondary/outbound port: every call is fire-and-forget from the relay's
//! point of view. A failing archive must never abort the feed session or
//! delay delivery to subscribers; the caller logs and swallows errors.

use async_trait::async_trait;

use crate::domain::event::{BookLevel, TradeEvent};

/// Archive error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ArchiveError {
    /// The archive could not be opened or created.
    #[error("archive open failed: {0}")]
    Open(String),

    /// A write failed.
    #[error("archive write failed: {0}")]
    Write(String),

    /// A record could not be serialized.
    #[error("archive serialization failed: {0}")]
    Serialize(String),
}

/// Port for archiving feed data.
///
/// Implementations must be safe to call concurrently. The relay invokes one
/// of these per accepted real-feed message; synthetic data is never archived.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedArchive: Send + Sync {
    /// Store a raw upstream payload as received.
    async fn store_market_data(&self, raw: &str) -> Result<(), ArchiveError>;

    /// Store a normalized trade.
    async fn store_trade(&self, trade: &TradeEvent) -> Result<(), ArchiveError>;

    /// Store a best-book snapshot.
    async fn store_orderbook(&self, ask: &BookLevel, bid: &BookLevel) -> Result<(), ArchiveError>;
}
