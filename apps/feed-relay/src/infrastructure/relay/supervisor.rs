//! Relay Supervisor
//!
//! Top-level lifecycle for the relay: wires the subscriber registry, the
//! archive writer, and the feed session task together, and tears them down
//! together. The supervisor owns the cancellation token; `stop()` is
//! idempotent and safe to call at any point, including before the first
//! connect attempt has completed.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::FeedArchive;
use crate::domain::session::SessionState;
use crate::infrastructure::archive;
use crate::infrastructure::okx::session::{
    FeedSession, FeedSessionConfig, SessionCommand, SessionStats,
};
use crate::infrastructure::relay::registry::{SubscriberId, SubscriberRegistry};

/// Queue depth for session commands (snapshot requests).
const COMMAND_QUEUE_CAPACITY: usize = 32;

/// Cheap, clonable surface the transport layer uses to talk to the relay.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    registry: Arc<SubscriberRegistry>,
    stats: Arc<SessionStats>,
    command_tx: mpsc::Sender<SessionCommand>,
    state_rx: watch::Receiver<SessionState>,
}

impl RelayHandle {
    /// Register a downstream subscriber.
    ///
    /// When the session is currently simulating, one synthetic snapshot is
    /// requested for the new subscriber so it is not left without data
    /// until the next scheduled tick.
    pub fn subscribe(&self, sender: mpsc::Sender<String>) -> SubscriberId {
        let id = self.registry.add(sender);

        if *self.state_rx.borrow() == SessionState::Simulating {
            let _ = self
                .command_tx
                .try_send(SessionCommand::Snapshot { subscriber: id });
        }

        id
    }

    /// Deregister a downstream subscriber. Idempotent.
    pub fn unsubscribe(&self, id: &SubscriberId) {
        self.registry.remove(id);
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Watch receiver for session state changes.
    #[must_use]
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Session counters.
    #[must_use]
    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }
}

/// Owns and supervises the relay's long-lived tasks.
pub struct RelaySupervisor {
    handle: RelayHandle,
    cancel: CancellationToken,
    session_task: Mutex<Option<JoinHandle<()>>>,
    archive_task: Mutex<Option<JoinHandle<()>>>,
}

impl RelaySupervisor {
    /// Start the relay: spawn the archive writer (when an archive is
    /// configured) and the feed session task.
    #[must_use]
    pub fn start(
        config: FeedSessionConfig,
        feed_archive: Option<Arc<dyn FeedArchive>>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let registry = Arc::new(SubscriberRegistry::new());
        let stats = Arc::new(SessionStats::new());
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);

        let (archive_handle, archive_task) =
            archive::spawn_writer(feed_archive, cancel.clone());

        let session = FeedSession::new(
            config,
            Arc::clone(&registry),
            archive_handle,
            Arc::clone(&stats),
            state_tx,
            command_rx,
            cancel.clone(),
        );
        let session_task = tokio::spawn(session.run());

        tracing::info!("relay supervisor started");

        Self {
            handle: RelayHandle {
                registry,
                stats,
                command_tx,
                state_rx,
            },
            cancel,
            session_task: Mutex::new(Some(session_task)),
            archive_task: Mutex::new(archive_task),
        }
    }

    /// Get a handle for transports and the health surface.
    #[must_use]
    pub fn handle(&self) -> RelayHandle {
        self.handle.clone()
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    /// Whether an upstream connection handle currently exists.
    #[must_use]
    pub fn is_upstream_connected(&self) -> bool {
        self.state().is_upstream_connected()
    }

    /// Stop the relay: cancel all tasks and wait for them to finish.
    ///
    /// Idempotent: a second call finds nothing left to join. Safe to call
    /// before the session ever connected; the state lands on
    /// `Disconnected` either way.
    pub async fn stop(&self) {
        self.cancel.cancel();

        let session_task = self.session_task.lock().take();
        if let Some(task) = session_task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "session task join failed");
            }
        }

        let archive_task = self.archive_task.lock().take();
        if let Some(task) = archive_task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "archive writer join failed");
            }
        }

        tracing::info!("relay supervisor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> FeedSessionConfig {
        FeedSessionConfig {
            // Nothing listens here; connect attempts fail immediately.
            url: "ws://127.0.0.1:1".to_string(),
            ..FeedSessionConfig::default()
        }
    }

    #[tokio::test]
    async fn stop_before_connect_completes_is_safe() {
        let supervisor = RelaySupervisor::start(unreachable_config(), None);

        supervisor.stop().await;

        assert_eq!(supervisor.state(), SessionState::Disconnected);
        assert!(!supervisor.is_upstream_connected());
    }

    #[tokio::test]
    async fn stop_twice_is_idempotent() {
        let supervisor = RelaySupervisor::start(unreachable_config(), None);

        supervisor.stop().await;
        supervisor.stop().await;

        assert_eq!(supervisor.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn handle_registers_and_removes_subscribers() {
        let supervisor = RelaySupervisor::start(unreachable_config(), None);
        let handle = supervisor.handle();

        let (tx, _rx) = mpsc::channel(8);
        let id = handle.subscribe(tx);
        assert_eq!(handle.subscriber_count(), 1);

        handle.unsubscribe(&id);
        handle.unsubscribe(&id);
        assert_eq!(handle.subscriber_count(), 0);

        supervisor.stop().await;
    }
}
