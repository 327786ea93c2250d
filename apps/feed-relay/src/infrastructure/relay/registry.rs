//! Subscriber Registry
//!
//! Tracks currently-connected downstream observers and fans events out to
//! them. Membership is the only state mutated from multiple tasks: new
//! subscriptions arrive from WebSocket handlers while the session task is
//! broadcasting. A `parking_lot` lock guards the map; broadcast snapshots
//! membership under the read lock and delivers outside it, so removal during
//! iteration cannot occur.
//!
//! Delivery is non-blocking by contract: each subscriber is a bounded
//! channel, and a send that cannot complete immediately (full channel for a
//! slow consumer, closed channel for a gone one) fails that subscriber,
//! which is pruned within the same broadcast call. A slow subscriber never
//! delays the others.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::event::CanonicalEvent;
use crate::infrastructure::metrics;

/// Opaque handle identifying one downstream subscriber.
pub type SubscriberId = Uuid;

/// Registry of downstream subscribers keyed by handle identity.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<String>>>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its handle.
    ///
    /// The sender should be the bounded queue drained by the subscriber's
    /// transport task; pre-serialized JSON frames are pushed into it.
    pub fn add(&self, sender: mpsc::Sender<String>) -> SubscriberId {
        let id = Uuid::new_v4();
        let total = {
            let mut subscribers = self.subscribers.write();
            subscribers.insert(id, sender);
            subscribers.len()
        };

        metrics::set_subscribers(total);
        tracing::info!(subscriber = %id, total, "subscriber registered");
        id
    }

    /// Deregister a subscriber. Removing an already-absent handle is a no-op.
    pub fn remove(&self, id: &SubscriberId) {
        let removed = {
            let mut subscribers = self.subscribers.write();
            let removed = subscribers.remove(id).is_some();
            (removed, subscribers.len())
        };

        if removed.0 {
            metrics::set_subscribers(removed.1);
            tracing::info!(subscriber = %id, total = removed.1, "subscriber removed");
        }
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Serialize the event once and attempt delivery to every current
    /// subscriber. Subscribers whose send fails are removed as part of this
    /// call. Returns the number of successful deliveries.
    pub fn broadcast(&self, event: &CanonicalEvent) -> usize {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize event for broadcast");
                return 0;
            }
        };

        let snapshot: Vec<(SubscriberId, mpsc::Sender<String>)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        if snapshot.is_empty() {
            return 0;
        }

        let mut failed: Vec<SubscriberId> = Vec::new();
        for (id, tx) in &snapshot {
            if tx.try_send(payload.clone()).is_err() {
                failed.push(*id);
            }
        }

        if !failed.is_empty() {
            let total = {
                let mut subscribers = self.subscribers.write();
                for id in &failed {
                    subscribers.remove(id);
                }
                subscribers.len()
            };
            metrics::set_subscribers(total);
            metrics::record_subscribers_dropped(failed.len());
            tracing::warn!(
                dropped = failed.len(),
                total,
                "pruned unresponsive subscribers during broadcast"
            );
        }

        snapshot.len() - failed.len()
    }

    /// Deliver an event to a single subscriber. A failed send removes the
    /// subscriber, exactly as in `broadcast`. Returns whether delivery
    /// succeeded.
    pub fn send_to(&self, id: &SubscriberId, event: &CanonicalEvent) -> bool {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize event");
                return false;
            }
        };

        let sender = self.subscribers.read().get(id).cloned();
        match sender {
            Some(tx) if tx.try_send(payload).is_ok() => true,
            Some(_) => {
                self.remove(id);
                metrics::record_subscribers_dropped(1);
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::event::{TradeEvent, TradeSide};

    fn trade_event() -> CanonicalEvent {
        CanonicalEvent::Trade(TradeEvent {
            timestamp: Utc::now(),
            price: 45000.5,
            size: 0.01,
            side: TradeSide::Buy,
        })
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let registry = SubscriberRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        registry.add(tx1);
        registry.add(tx2);

        let delivered = registry.broadcast(&trade_event());

        assert_eq!(delivered, 2);
        let frame1 = rx1.recv().await.unwrap();
        let frame2 = rx2.recv().await.unwrap();
        assert_eq!(frame1, frame2);
        assert!(frame1.contains("\"type\":\"trade\""));
    }

    #[tokio::test]
    async fn failed_send_prunes_only_the_failing_subscriber() {
        let registry = SubscriberRegistry::new();

        let (gone_tx, gone_rx) = mpsc::channel(8);
        drop(gone_rx);

        let mut receivers = Vec::new();
        for _ in 0..4 {
            let (tx, rx) = mpsc::channel(8);
            registry.add(tx);
            receivers.push(rx);
        }
        registry.add(gone_tx);
        assert_eq!(registry.len(), 5);

        let delivered = registry.broadcast(&trade_event());

        assert_eq!(delivered, 4);
        assert_eq!(registry.len(), 4);
        for rx in &mut receivers {
            assert!(rx.recv().await.is_some());
        }
    }

    #[tokio::test]
    async fn full_queue_counts_as_failure() {
        let registry = SubscriberRegistry::new();
        let (slow_tx, _slow_rx) = mpsc::channel(1);
        let (ok_tx, mut ok_rx) = mpsc::channel(8);
        registry.add(slow_tx);
        registry.add(ok_tx);

        // First broadcast fills the slow subscriber's queue.
        assert_eq!(registry.broadcast(&trade_event()), 2);
        // Second cannot place a frame; the slow subscriber is dropped.
        assert_eq!(registry.broadcast(&trade_event()), 1);
        assert_eq!(registry.len(), 1);

        assert!(ok_rx.recv().await.is_some());
        assert!(ok_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = SubscriberRegistry::new();
        let (tx, _rx) = mpsc::channel(8);
        let id = registry.add(tx);

        registry.remove(&id);
        registry.remove(&id);
        registry.remove(&Uuid::new_v4());

        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn send_to_targets_one_subscriber() {
        let registry = SubscriberRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        let id1 = registry.add(tx1);
        registry.add(tx2);

        assert!(registry.send_to(&id1, &trade_event()));

        assert!(rx1.recv().await.is_some());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_unknown_subscriber_is_false() {
        let registry = SubscriberRegistry::new();
        assert!(!registry.send_to(&Uuid::new_v4(), &trade_event()));
    }

    #[tokio::test]
    async fn send_to_dead_subscriber_prunes_it() {
        let registry = SubscriberRegistry::new();
        let (tx, rx) = mpsc::channel(8);
        let id = registry.add(tx);
        drop(rx);

        assert!(!registry.send_to(&id, &trade_event()));
        assert!(registry.is_empty());
    }

    #[test]
    fn broadcast_with_no_subscribers_delivers_nothing() {
        let registry = SubscriberRegistry::new();
        assert_eq!(registry.broadcast(&trade_event()), 0);
    }
}
