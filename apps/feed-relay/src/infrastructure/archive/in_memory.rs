//! In-memory archive for testing.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::application::ports::{ArchiveError, FeedArchive};
use crate::domain::event::{BookLevel, TradeEvent};

/// In-memory implementation of `FeedArchive`.
///
/// Suitable for tests and development. Not for production use.
#[derive(Debug, Default)]
pub struct InMemoryArchive {
    market_data: RwLock<Vec<String>>,
    trades: RwLock<Vec<TradeEvent>>,
    orderbooks: RwLock<Vec<(BookLevel, BookLevel)>>,
}

impl InMemoryArchive {
    /// Create a new empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw payloads stored so far.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn market_data(&self) -> Vec<String> {
        self.market_data.read().unwrap().clone()
    }

    /// Trades stored so far.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn trades(&self) -> Vec<TradeEvent> {
        self.trades.read().unwrap().clone()
    }

    /// Best-book snapshots stored so far.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn orderbooks(&self) -> Vec<(BookLevel, BookLevel)> {
        self.orderbooks.read().unwrap().clone()
    }
}

#[async_trait]
#[allow(clippy::unwrap_used)]
impl FeedArchive for InMemoryArchive {
    async fn store_market_data(&self, raw: &str) -> Result<(), ArchiveError> {
        self.market_data.write().unwrap().push(raw.to_string());
        Ok(())
    }

    async fn store_trade(&self, trade: &TradeEvent) -> Result<(), ArchiveError> {
        self.trades.write().unwrap().push(trade.clone());
        Ok(())
    }

    async fn store_orderbook(&self, ask: &BookLevel, bid: &BookLevel) -> Result<(), ArchiveError> {
        self.orderbooks.write().unwrap().push((*ask, *bid));
        Ok(())
    }
}
