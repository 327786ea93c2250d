//! HTTP Server
//!
//! One axum server carries every outward surface of the relay: the
//! downstream subscriber WebSocket, the stateless REST API, the health
//! probes, and the Prometheus metrics endpoint. CORS is wide open, matching
//! the browser frontend this API serves.

pub mod api;
pub mod ws;

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::infrastructure::health;
use crate::infrastructure::relay::supervisor::RelayHandle;

/// Shared state for all HTTP handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Surface into the relay core.
    pub relay: RelayHandle,
    /// Relay version reported by the health endpoint.
    pub version: String,
    /// Server start time for uptime reporting.
    pub started_at: Instant,
    /// Per-subscriber outbound queue depth.
    pub subscriber_buffer: usize,
}

impl AppState {
    /// Create handler state.
    #[must_use]
    pub fn new(relay: RelayHandle, version: impl Into<String>, subscriber_buffer: usize) -> Self {
        Self {
            relay,
            version: version.into(),
            started_at: Instant::now(),
            subscriber_buffer,
        }
    }
}

/// Build the full application router.
#[must_use]
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/healthz", get(health::liveness_handler))
        .route("/readyz", get(health::readiness_handler))
        .route("/metrics", get(health::metrics_handler))
        .route("/ws/market-data", get(ws::market_data_handler))
        .route("/api/simulate", post(api::simulate_handler))
        .route("/api/historical", get(api::historical_handler))
        .route("/api/price-history", get(api::price_history_handler))
        .route("/api/assets", get(api::assets_handler))
        .layer(cors)
        .with_state(state)
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

/// The relay's HTTP server.
pub struct ApiServer {
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
}

impl ApiServer {
    /// Bind the server. Port 0 binds an ephemeral port, useful in tests.
    ///
    /// # Errors
    ///
    /// Returns `ApiServerError::BindFailed` when the port is taken.
    pub async fn bind(
        port: u16,
        state: AppState,
        cancel: CancellationToken,
    ) -> Result<Self, ApiServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiServerError::BindFailed(port, e.to_string()))?;

        Ok(Self {
            listener,
            state,
            cancel,
        })
    }

    /// The address the server is bound to.
    ///
    /// # Errors
    ///
    /// Returns `ApiServerError::ServerFailed` when the socket is gone.
    pub fn local_addr(&self) -> Result<SocketAddr, ApiServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ApiServerError::ServerFailed(e.to_string()))
    }

    /// Serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ApiServerError::ServerFailed` on a fatal server error.
    pub async fn run(self) -> Result<(), ApiServerError> {
        let addr = self.local_addr()?;
        tracing::info!(addr = %addr, "http server listening");

        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ApiServerError::ServerFailed(e.to_string()))?;

        tracing::info!("http server stopped");
        Ok(())
    }
}
