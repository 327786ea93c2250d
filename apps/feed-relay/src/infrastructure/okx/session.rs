//! Feed Session
//!
//! Owns the upstream connection and drives the reconnect/backoff/simulation
//! state machine. This task is the only writer of the session state and the
//! failure streak; everything else observes through the watch channel.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ──start()──► Connecting ──ok──► Connected ──drop──► ReconnectWait
//!       ▲                        ▲                                      │
//!       │                        └──────── wait elapsed, retry ─────────┤
//!       │                                                               │ wait elapsed,
//!       └──────────────── stop() from any state ◄──── Simulating ◄──────┘ threshold hit
//! ```
//!
//! Once the backoff policy crosses its threshold the session switches to the
//! synthetic generator and stays there; the upstream is not retried again
//! for the lifetime of the session.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::domain::event::CanonicalEvent;
use crate::domain::session::SessionState;
use crate::infrastructure::archive::ArchiveHandle;
use crate::infrastructure::metrics;
use crate::infrastructure::okx::backoff::{BackoffConfig, BackoffPolicy};
use crate::infrastructure::okx::messages::{FeedEnvelope, SubscribeRequest};
use crate::infrastructure::okx::normalizer::Normalizer;
use crate::infrastructure::okx::simulator::{SimulatorConfig, SyntheticFeed};
use crate::infrastructure::relay::registry::{SubscriberId, SubscriberRegistry};

/// Default OKX public WebSocket endpoint.
pub const DEFAULT_FEED_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";

/// Default instrument the relay subscribes to.
pub const DEFAULT_INSTRUMENT: &str = "BTC-USDT-SWAP";

// =============================================================================
// Errors
// =============================================================================

/// Errors that end one upstream connection attempt. All of them are
/// transient: the session handles every variant with backoff and never
/// surfaces them to subscribers or the caller.
#[derive(Debug, thiserror::Error)]
pub enum FeedSessionError {
    /// The connect attempt failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The connect attempt exceeded the configured timeout.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// WebSocket protocol error while streaming.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The subscribe request could not be sent.
    #[error("subscribe request failed: {0}")]
    Subscribe(String),

    /// The upstream closed the stream.
    #[error("upstream closed the connection")]
    StreamClosed,

    /// No inbound traffic within the idle timeout.
    #[error("keepalive timed out")]
    KeepaliveTimeout,
}

// =============================================================================
// Commands and Statistics
// =============================================================================

/// Requests other tasks may send to the session task.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Deliver one synthetic snapshot to a newly joined subscriber.
    /// Ignored unless the session is simulating.
    Snapshot {
        /// The subscriber to serve.
        subscriber: SubscriberId,
    },
}

/// Counters written only by the session task, read by the health surface.
#[derive(Debug, Default)]
pub struct SessionStats {
    messages_received: AtomicU64,
    events_broadcast: AtomicU64,
    reconnect_attempts: AtomicU64,
    malformed_messages: AtomicU64,
}

impl SessionStats {
    /// Create zeroed statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw upstream messages received.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Canonical events broadcast (real and synthetic).
    #[must_use]
    pub fn events_broadcast(&self) -> u64 {
        self.events_broadcast.load(Ordering::Relaxed)
    }

    /// Reconnection attempts made.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Messages dropped as malformed.
    #[must_use]
    pub fn malformed_messages(&self) -> u64 {
        self.malformed_messages.load(Ordering::Relaxed)
    }

    fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    fn record_event(&self) {
        self.events_broadcast.fetch_add(1, Ordering::Relaxed);
    }

    fn record_reconnect(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_malformed(&self) {
        self.malformed_messages.fetch_add(1, Ordering::Relaxed);
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the feed session.
#[derive(Debug, Clone)]
pub struct FeedSessionConfig {
    /// Upstream WebSocket URL.
    pub url: String,
    /// Instrument to subscribe to.
    pub instrument: String,
    /// Bound on one connect attempt.
    pub connect_timeout: Duration,
    /// Interval between keepalive pings.
    pub ping_interval: Duration,
    /// Connection is considered dropped after this long without any
    /// inbound frame.
    pub idle_timeout: Duration,
    /// Backoff policy configuration.
    pub backoff: BackoffConfig,
    /// Synthetic generator configuration.
    pub simulator: SimulatorConfig,
}

impl Default for FeedSessionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            instrument: DEFAULT_INSTRUMENT.to_string(),
            connect_timeout: Duration::from_secs(30),
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
            backoff: BackoffConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

// =============================================================================
// Feed Session
// =============================================================================

/// The upstream feed session task.
///
/// Created and spawned by the relay supervisor; runs until cancelled.
pub struct FeedSession {
    config: FeedSessionConfig,
    normalizer: Normalizer,
    backoff: BackoffPolicy,
    simulator: SyntheticFeed,
    registry: Arc<SubscriberRegistry>,
    archive: ArchiveHandle,
    stats: Arc<SessionStats>,
    state_tx: watch::Sender<SessionState>,
    command_rx: mpsc::Receiver<SessionCommand>,
    cancel: CancellationToken,
    failure_streak: u32,
}

impl FeedSession {
    /// Create a new session.
    #[must_use]
    pub fn new(
        config: FeedSessionConfig,
        registry: Arc<SubscriberRegistry>,
        archive: ArchiveHandle,
        stats: Arc<SessionStats>,
        state_tx: watch::Sender<SessionState>,
        command_rx: mpsc::Receiver<SessionCommand>,
        cancel: CancellationToken,
    ) -> Self {
        let normalizer = Normalizer::new(config.instrument.clone());
        let backoff = BackoffPolicy::new(config.backoff.clone());
        let simulator = SyntheticFeed::new(config.simulator.clone(), config.instrument.clone());

        Self {
            config,
            normalizer,
            backoff,
            simulator,
            registry,
            archive,
            stats,
            state_tx,
            command_rx,
            cancel,
            failure_streak: 0,
        }
    }

    /// Drive the session until cancelled.
    ///
    /// Connect failures and drops feed the backoff policy; once the policy
    /// says to simulate, the synthetic generator takes over until stop.
    /// The state always lands on `Disconnected` exactly once on the way out.
    pub async fn run(mut self) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.set_state(SessionState::Connecting);

            match self.connect_and_stream().await {
                Ok(()) => break,
                Err(e) => {
                    let decision = self.backoff.next(self.failure_streak);
                    self.failure_streak += 1;
                    self.stats.record_reconnect();
                    metrics::record_reconnect();

                    self.set_state(SessionState::ReconnectWait);
                    tracing::warn!(
                        error = %e,
                        failure_streak = self.failure_streak,
                        wait_ms = u64::try_from(decision.wait.as_millis()).unwrap_or(u64::MAX),
                        should_simulate = decision.should_simulate,
                        "upstream session failed"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(decision.wait) => {}
                    }

                    if decision.should_simulate {
                        self.set_state(SessionState::Simulating);
                        self.run_simulation().await;
                        break;
                    }
                }
            }
        }

        self.set_state(SessionState::Disconnected);
        tracing::info!("feed session stopped");
    }

    /// One upstream connection: connect, subscribe, stream until failure.
    ///
    /// Returns `Ok(())` only on cancellation; every other exit is an error
    /// the caller converts into a backoff decision.
    async fn connect_and_stream(&mut self) -> Result<(), FeedSessionError> {
        tracing::info!(url = %self.config.url, "connecting to upstream feed");

        let connect = tokio_tungstenite::connect_async(self.config.url.as_str());
        let ws_stream = tokio::select! {
            () = self.cancel.cancelled() => return Ok(()),
            result = tokio::time::timeout(self.config.connect_timeout, connect) => {
                let (ws_stream, _response) = result
                    .map_err(|_| FeedSessionError::ConnectTimeout(self.config.connect_timeout))?
                    .map_err(|e| FeedSessionError::Connect(e.to_string()))?;
                ws_stream
            }
        };

        let (mut write, mut read) = ws_stream.split();

        // A subscribe failure is handled exactly like a connection drop.
        let request = SubscribeRequest::market_data(&self.config.instrument);
        let payload = serde_json::to_string(&request)
            .map_err(|e| FeedSessionError::Subscribe(e.to_string()))?;
        write
            .send(Message::Text(payload.into()))
            .await
            .map_err(|e| FeedSessionError::Subscribe(e.to_string()))?;

        tracing::info!(
            instrument = %self.config.instrument,
            "subscribed to ticker and trade channels"
        );

        self.set_state(SessionState::Connected);
        self.failure_streak = 0;

        let mut last_activity = Instant::now();
        let mut ping_timer = tokio::time::interval(self.config.ping_interval);
        ping_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Ok(()),
                _ = ping_timer.tick() => {
                    if last_activity.elapsed() >= self.config.idle_timeout {
                        return Err(FeedSessionError::KeepaliveTimeout);
                    }
                    write.send(Message::Ping(vec![].into())).await?;
                }
                Some(command) = self.command_rx.recv() => {
                    self.handle_command(command);
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            last_activity = Instant::now();
                            self.handle_feed_message(text.as_str());
                        }
                        Some(Ok(Message::Ping(data))) => {
                            last_activity = Instant::now();
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            last_activity = Instant::now();
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("upstream sent close frame");
                            return Err(FeedSessionError::StreamClosed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(FeedSessionError::StreamClosed),
                    }
                }
            }
        }
    }

    /// Process one raw upstream message: archive, normalize, broadcast.
    ///
    /// Any failure here is absorbed as a malformed-message drop; nothing on
    /// this path may end the session.
    fn handle_feed_message(&mut self, raw: &str) {
        let started = Instant::now();
        self.stats.record_message();
        metrics::record_message_received();

        let envelope: FeedEnvelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.stats.record_malformed();
                metrics::record_malformed_message();
                tracing::warn!(error = %e, raw, "dropping undecodable feed message");
                return;
            }
        };

        // Only data frames are archived; control frames are not feed data.
        if envelope.is_data_frame() {
            self.archive.store_market_data(raw);
        }

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        match self.normalizer.normalize_envelope(envelope, Utc::now(), latency_ms) {
            Ok(Some(event)) => {
                self.failure_streak = 0;

                match &event {
                    CanonicalEvent::Trade(trade) => self.archive.store_trade(trade.clone()),
                    CanonicalEvent::Ticker(ticker) => {
                        self.archive.store_orderbook(ticker.ask, ticker.bid);
                    }
                }

                let delivered = self.registry.broadcast(&event);
                self.stats.record_event();
                metrics::record_event(event.kind(), metrics::EventSource::Live);
                metrics::record_processing_duration(started.elapsed());
                tracing::trace!(kind = event.kind(), delivered, "event broadcast");
            }
            Ok(None) => {}
            Err(e) => {
                self.stats.record_malformed();
                metrics::record_malformed_message();
                tracing::warn!(error = %e, raw, "dropping malformed feed message");
            }
        }
    }

    /// Generator loop: ticks until cancelled. Sticky: there is no path
    /// back to the upstream from here.
    async fn run_simulation(&mut self) {
        tracing::info!(
            instrument = %self.config.instrument,
            price = self.simulator.last_price(),
            "switching to simulated market data after repeated connection failures"
        );

        let mut ticks = tokio::time::interval(self.config.simulator.tick_interval);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                Some(command) = self.command_rx.recv() => {
                    self.handle_command(command);
                }
                _ = ticks.tick() => {
                    self.emit_synthetic_tick();
                }
            }
        }
    }

    /// Emit one synthetic ticker, and possibly a trade, to all subscribers.
    fn emit_synthetic_tick(&mut self) {
        let ticker = CanonicalEvent::Ticker(self.simulator.tick());
        let delivered = self.registry.broadcast(&ticker);
        self.stats.record_event();
        metrics::record_event("ticker", metrics::EventSource::Simulated);
        tracing::trace!(delivered, "synthetic ticker broadcast");

        if let Some(trade) = self.simulator.maybe_trade() {
            let event = CanonicalEvent::Trade(trade);
            self.registry.broadcast(&event);
            self.stats.record_event();
            metrics::record_event("trade", metrics::EventSource::Simulated);
        }
    }

    /// Handle a request from another task.
    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Snapshot { subscriber } => {
                if *self.state_tx.borrow() == SessionState::Simulating {
                    let event = CanonicalEvent::Ticker(self.simulator.tick());
                    if self.registry.send_to(&subscriber, &event) {
                        self.stats.record_event();
                        metrics::record_event("ticker", metrics::EventSource::Simulated);
                        tracing::debug!(subscriber = %subscriber, "synthetic snapshot delivered");
                    }
                } else {
                    tracing::trace!(
                        subscriber = %subscriber,
                        "snapshot request ignored outside simulation"
                    );
                }
            }
        }
    }

    /// Publish a state change; no-op when the state is unchanged, so the
    /// final transition to `Disconnected` happens exactly once.
    fn set_state(&self, next: SessionState) {
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });

        if changed {
            tracing::info!(state = next.as_str(), "session state changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Harness {
        session: FeedSession,
        state_rx: watch::Receiver<SessionState>,
        #[allow(dead_code)]
        command_tx: mpsc::Sender<SessionCommand>,
        registry: Arc<SubscriberRegistry>,
        stats: Arc<SessionStats>,
    }

    fn harness() -> Harness {
        let registry = Arc::new(SubscriberRegistry::new());
        let stats = Arc::new(SessionStats::new());
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(8);

        let session = FeedSession::new(
            FeedSessionConfig::default(),
            Arc::clone(&registry),
            ArchiveHandle::disabled(),
            Arc::clone(&stats),
            state_tx,
            command_rx,
            CancellationToken::new(),
        );

        Harness {
            session,
            state_rx,
            command_tx,
            registry,
            stats,
        }
    }

    #[tokio::test]
    async fn valid_message_is_broadcast_and_counted() {
        let mut h = harness();
        let (tx, mut rx) = mpsc::channel(8);
        h.registry.add(tx);

        h.session.handle_feed_message(
            r#"{"arg":{"channel":"trades","instId":"BTC-USDT-SWAP"},
               "data":[{"ts":"1700000000000","px":"45000.5","sz":"0.01","side":"BUY"}]}"#,
        );

        let frame = rx.recv().await.unwrap();
        assert!(frame.contains("\"type\":\"trade\""));
        assert!(frame.contains("\"side\":\"buy\""));
        assert_eq!(h.stats.messages_received(), 1);
        assert_eq!(h.stats.events_broadcast(), 1);
        assert_eq!(h.stats.malformed_messages(), 0);
    }

    #[tokio::test]
    async fn malformed_message_is_dropped_not_fatal() {
        let mut h = harness();
        let (tx, mut rx) = mpsc::channel(8);
        h.registry.add(tx);

        h.session.handle_feed_message(
            r#"{"arg":{"channel":"trades"},"data":[{"ts":"x","px":"y","sz":"z","side":"BUY"}]}"#,
        );

        assert!(rx.try_recv().is_err());
        assert_eq!(h.stats.malformed_messages(), 1);
        assert_eq!(h.stats.events_broadcast(), 0);
    }

    #[tokio::test]
    async fn control_frames_produce_no_events() {
        let mut h = harness();
        h.session
            .handle_feed_message(r#"{"event":"subscribe","arg":{"channel":"tickers"}}"#);

        assert_eq!(h.stats.messages_received(), 1);
        assert_eq!(h.stats.events_broadcast(), 0);
        assert_eq!(h.stats.malformed_messages(), 0);
    }

    #[tokio::test]
    async fn message_receipt_resets_failure_streak() {
        let mut h = harness();
        h.session.failure_streak = 2;

        h.session.handle_feed_message(
            r#"{"arg":{"channel":"tickers"},"data":[{"last":"100.0","open24h":"50.0"}]}"#,
        );

        assert_eq!(h.session.failure_streak, 0);
    }

    #[tokio::test]
    async fn snapshot_command_is_ignored_outside_simulation() {
        let mut h = harness();
        let (tx, mut rx) = mpsc::channel(8);
        let id = h.registry.add(tx);

        h.session.handle_command(SessionCommand::Snapshot { subscriber: id });

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn snapshot_command_serves_one_subscriber_while_simulating() {
        let mut h = harness();
        h.session.set_state(SessionState::Simulating);

        let (tx, mut rx) = mpsc::channel(8);
        let id = h.registry.add(tx);
        let (other_tx, mut other_rx) = mpsc::channel(8);
        h.registry.add(other_tx);

        h.session.handle_command(SessionCommand::Snapshot { subscriber: id });

        let frame = rx.recv().await.unwrap();
        assert!(frame.contains("\"type\":\"ticker\""));
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn state_transitions_publish_once() {
        let h = harness();

        h.session.set_state(SessionState::Connecting);
        assert_eq!(*h.state_rx.borrow(), SessionState::Connecting);

        // Re-publishing the same state is a no-op.
        h.session.set_state(SessionState::Connecting);
        let mut rx = h.state_rx.clone();
        rx.mark_unchanged();
        h.session.set_state(SessionState::Connecting);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn synthetic_tick_reaches_all_subscribers() {
        let mut h = harness();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        h.registry.add(tx1);
        h.registry.add(tx2);

        h.session.emit_synthetic_tick();

        assert!(rx1.recv().await.unwrap().contains("\"type\":\"ticker\""));
        assert!(rx2.recv().await.unwrap().contains("\"type\":\"ticker\""));
        assert!(h.stats.events_broadcast() >= 1);
    }
}
