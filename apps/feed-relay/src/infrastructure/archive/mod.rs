//! Archive Adapters
//!
//! Fire-and-forget persistence of accepted feed messages. The session task
//! never awaits a write: it pushes requests into a bounded queue drained by
//! a dedicated writer task. A full queue sheds the write (counted and
//! logged), and storage failures are logged and swallowed; the feed is
//! never interrupted by its archive.

pub mod in_memory;
pub mod jsonl;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::FeedArchive;
use crate::domain::event::{BookLevel, TradeEvent};
use crate::infrastructure::metrics;

pub use in_memory::InMemoryArchive;
pub use jsonl::JsonlArchive;

/// Queue depth between the session task and the writer.
const ARCHIVE_QUEUE_CAPACITY: usize = 1024;

/// One archive operation, mirroring the port surface.
#[derive(Debug, Clone)]
pub enum ArchiveRequest {
    /// Raw upstream payload.
    MarketData(String),
    /// Normalized trade.
    Trade(TradeEvent),
    /// Best-book snapshot.
    Orderbook {
        /// Best ask level.
        ask: BookLevel,
        /// Best bid level.
        bid: BookLevel,
    },
}

/// Cheap handle the session uses to submit archive writes.
///
/// A disabled handle (no archive configured) accepts and discards
/// everything, keeping the session's hot path branch-free.
#[derive(Debug, Clone)]
pub struct ArchiveHandle {
    tx: Option<mpsc::Sender<ArchiveRequest>>,
}

impl ArchiveHandle {
    /// Handle that discards all requests.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { tx: None }
    }

    /// Whether an archive is attached.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Submit a raw payload for archiving.
    pub fn store_market_data(&self, raw: &str) {
        self.submit(ArchiveRequest::MarketData(raw.to_string()));
    }

    /// Submit a normalized trade for archiving.
    pub fn store_trade(&self, trade: TradeEvent) {
        self.submit(ArchiveRequest::Trade(trade));
    }

    /// Submit a best-book snapshot for archiving.
    pub fn store_orderbook(&self, ask: BookLevel, bid: BookLevel) {
        self.submit(ArchiveRequest::Orderbook { ask, bid });
    }

    fn submit(&self, request: ArchiveRequest) {
        let Some(tx) = &self.tx else {
            return;
        };

        if tx.try_send(request).is_err() {
            metrics::record_archive_failure();
            tracing::debug!("archive queue full, shedding write");
        }
    }
}

/// Spawn the archive writer task.
///
/// Returns a submission handle plus the writer's join handle (absent when no
/// archive is configured). The writer drains the queue until the token is
/// cancelled, logging and swallowing individual write failures.
pub fn spawn_writer(
    archive: Option<std::sync::Arc<dyn FeedArchive>>,
    cancel: CancellationToken,
) -> (ArchiveHandle, Option<JoinHandle<()>>) {
    let Some(archive) = archive else {
        return (ArchiveHandle::disabled(), None);
    };

    let (tx, mut rx) = mpsc::channel::<ArchiveRequest>(ARCHIVE_QUEUE_CAPACITY);

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("archive writer cancelled");
                    break;
                }
                request = rx.recv() => {
                    match request {
                        Some(request) => write_one(archive.as_ref(), request).await,
                        None => break,
                    }
                }
            }
        }
    });

    (ArchiveHandle { tx: Some(tx) }, Some(task))
}

async fn write_one(archive: &dyn FeedArchive, request: ArchiveRequest) {
    let result = match &request {
        ArchiveRequest::MarketData(raw) => archive.store_market_data(raw).await,
        ArchiveRequest::Trade(trade) => archive.store_trade(trade).await,
        ArchiveRequest::Orderbook { ask, bid } => archive.store_orderbook(ask, bid).await,
    };

    if let Err(e) = result {
        metrics::record_archive_failure();
        tracing::warn!(error = %e, "archive write failed");
    }
}
