//! JSONL Archive - Append-only Daily Files
//!
//! Persists feed records to daily JSONL files under a data directory:
//! `market_data/YYYY-MM-DD.jsonl`, `trades/YYYY-MM-DD.jsonl`,
//! `orderbook/YYYY-MM-DD.jsonl`. Each line is a self-contained JSON record,
//! so the archive supports append-only writes, line-by-line streaming, and
//! natural daily partitioning.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::application::ports::{ArchiveError, FeedArchive};
use crate::domain::event::{BookLevel, TradeEvent};

/// Append-only JSONL archive with daily file rotation.
pub struct JsonlArchive {
    market_data_dir: PathBuf,
    trades_dir: PathBuf,
    orderbook_dir: PathBuf,
    exchange: String,
    symbol: String,
}

/// Raw payload record as written to `market_data/`.
#[derive(Debug, Serialize)]
struct MarketDataRecord<'a> {
    timestamp: String,
    exchange: &'a str,
    symbol: &'a str,
    data: serde_json::Value,
}

/// Trade record as written to `trades/`.
#[derive(Debug, Serialize)]
struct TradeRecord<'a> {
    timestamp: String,
    exchange: &'a str,
    symbol: &'a str,
    price: f64,
    size: f64,
    side: &'a str,
}

/// Best-book record as written to `orderbook/`.
#[derive(Debug, Serialize)]
struct OrderbookRecord<'a> {
    timestamp: String,
    exchange: &'a str,
    symbol: &'a str,
    asks: Vec<[f64; 2]>,
    bids: Vec<[f64; 2]>,
}

impl JsonlArchive {
    /// Open (creating if needed) an archive rooted at `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::Open` when the directories cannot be created.
    pub async fn open(
        data_dir: impl AsRef<Path>,
        symbol: impl Into<String>,
    ) -> Result<Self, ArchiveError> {
        let root = data_dir.as_ref();
        let market_data_dir = root.join("market_data");
        let trades_dir = root.join("trades");
        let orderbook_dir = root.join("orderbook");

        for dir in [&market_data_dir, &trades_dir, &orderbook_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| ArchiveError::Open(format!("{}: {e}", dir.display())))?;
        }

        Ok(Self {
            market_data_dir,
            trades_dir,
            orderbook_dir,
            exchange: "OKX".to_string(),
            symbol: symbol.into(),
        })
    }

    fn stamp() -> String {
        Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    async fn append<T: Serialize>(dir: &Path, record: &T) -> Result<(), ArchiveError> {
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let path = dir.join(format!("{date}.jsonl"));

        let mut line = serde_json::to_string(record)
            .map_err(|e| ArchiveError::Serialize(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ArchiveError::Write(format!("{}: {e}", path.display())))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ArchiveError::Write(format!("{}: {e}", path.display())))?;
        file.flush()
            .await
            .map_err(|e| ArchiveError::Write(format!("{}: {e}", path.display())))?;

        Ok(())
    }
}

#[async_trait]
impl FeedArchive for JsonlArchive {
    async fn store_market_data(&self, raw: &str) -> Result<(), ArchiveError> {
        let data: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| ArchiveError::Serialize(e.to_string()))?;

        let record = MarketDataRecord {
            timestamp: Self::stamp(),
            exchange: &self.exchange,
            symbol: &self.symbol,
            data,
        };
        Self::append(&self.market_data_dir, &record).await
    }

    async fn store_trade(&self, trade: &TradeEvent) -> Result<(), ArchiveError> {
        let record = TradeRecord {
            timestamp: trade
                .timestamp
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string(),
            exchange: &self.exchange,
            symbol: &self.symbol,
            price: trade.price,
            size: trade.size,
            side: trade.side.as_str(),
        };
        Self::append(&self.trades_dir, &record).await
    }

    async fn store_orderbook(&self, ask: &BookLevel, bid: &BookLevel) -> Result<(), ArchiveError> {
        let record = OrderbookRecord {
            timestamp: Self::stamp(),
            exchange: &self.exchange,
            symbol: &self.symbol,
            asks: vec![[ask.price, ask.size]],
            bids: vec![[bid.price, bid.size]],
        };
        Self::append(&self.orderbook_dir, &record).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::domain::event::TradeSide;

    async fn read_single_line(dir: &Path) -> serde_json::Value {
        let mut entries = fs::read_dir(dir).await.unwrap();
        let entry = entries.next_entry().await.unwrap().unwrap();
        let content = fs::read_to_string(entry.path()).await.unwrap();
        let line = content.lines().next().unwrap();
        serde_json::from_str(line).unwrap()
    }

    #[tokio::test]
    async fn stores_raw_market_data() {
        let dir = tempfile::tempdir().unwrap();
        let archive = JsonlArchive::open(dir.path(), "BTC-USDT-SWAP")
            .await
            .unwrap();

        archive
            .store_market_data(r#"{"arg":{"channel":"tickers"},"data":[{"last":"1"}]}"#)
            .await
            .unwrap();

        let record = read_single_line(&dir.path().join("market_data")).await;
        assert_eq!(record["exchange"], "OKX");
        assert_eq!(record["symbol"], "BTC-USDT-SWAP");
        assert_eq!(record["data"]["arg"]["channel"], "tickers");
    }

    #[tokio::test]
    async fn rejects_invalid_raw_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let archive = JsonlArchive::open(dir.path(), "BTC-USDT-SWAP")
            .await
            .unwrap();

        assert!(archive.store_market_data("not json").await.is_err());
    }

    #[tokio::test]
    async fn stores_trades_with_wire_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let archive = JsonlArchive::open(dir.path(), "BTC-USDT-SWAP")
            .await
            .unwrap();

        let trade = TradeEvent {
            timestamp: DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap(),
            price: 45000.5,
            size: 0.01,
            side: TradeSide::Buy,
        };
        archive.store_trade(&trade).await.unwrap();

        let record = read_single_line(&dir.path().join("trades")).await;
        assert_eq!(record["timestamp"], "2023-11-14T22:13:20Z");
        assert_eq!(record["price"], 45000.5);
        assert_eq!(record["side"], "buy");
    }

    #[tokio::test]
    async fn stores_orderbook_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let archive = JsonlArchive::open(dir.path(), "BTC-USDT-SWAP")
            .await
            .unwrap();

        archive
            .store_orderbook(
                &BookLevel {
                    price: 45000.6,
                    size: 1.5,
                },
                &BookLevel {
                    price: 45000.4,
                    size: 2.5,
                },
            )
            .await
            .unwrap();

        let record = read_single_line(&dir.path().join("orderbook")).await;
        assert_eq!(record["asks"][0][0], 45000.6);
        assert_eq!(record["bids"][0][1], 2.5);
    }

    #[tokio::test]
    async fn appends_accumulate_lines() {
        let dir = tempfile::tempdir().unwrap();
        let archive = JsonlArchive::open(dir.path(), "BTC-USDT-SWAP")
            .await
            .unwrap();

        for _ in 0..3 {
            archive.store_market_data(r#"{"n":1}"#).await.unwrap();
        }

        let mut entries = fs::read_dir(dir.path().join("market_data")).await.unwrap();
        let entry = entries.next_entry().await.unwrap().unwrap();
        let content = fs::read_to_string(entry.path()).await.unwrap();
        assert_eq!(content.lines().count(), 3);
    }
}
