//! Health Check Endpoints
//!
//! HTTP handlers for health checks, session status reporting, and
//! Prometheus metrics. Used by container orchestrators, load balancers,
//! and monitoring systems.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (data is flowing, real or synthetic)
//! - `GET /metrics` - Prometheus metrics in text format

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::session::SessionState;
use crate::infrastructure::http::AppState;
use crate::infrastructure::metrics::get_metrics_handle;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Relay version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Feed session status.
    pub session: SessionInfo,
    /// Downstream subscriber status.
    pub subscribers: SubscriberStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Connected to the real upstream feed.
    Healthy,
    /// Serving synthetic data after upstream failure.
    Degraded,
    /// No data is being delivered.
    Unhealthy,
}

/// Feed session status.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    /// Session state name.
    pub state: SessionState,
    /// Whether an upstream connection handle currently exists.
    pub upstream_connected: bool,
    /// Whether the session has fallen back to synthetic data.
    pub simulating: bool,
    /// Raw messages received from the upstream.
    pub messages_received: u64,
    /// Canonical events broadcast.
    pub events_broadcast: u64,
    /// Reconnection attempts made.
    pub reconnect_attempts: u64,
    /// Messages dropped as malformed.
    pub malformed_messages: u64,
}

/// Downstream subscriber status.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriberStatus {
    /// Currently registered subscribers.
    pub total: usize,
}

/// `GET /health`
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

/// `GET /healthz`
pub async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// `GET /readyz`
pub async fn readiness_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.relay.state().is_delivering() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

/// `GET /metrics`
pub async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let session_state = state.relay.state();
    let stats = state.relay.stats();

    HealthResponse {
        status: determine_health_status(session_state),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        session: SessionInfo {
            state: session_state,
            upstream_connected: session_state.is_upstream_connected(),
            simulating: session_state == SessionState::Simulating,
            messages_received: stats.messages_received(),
            events_broadcast: stats.events_broadcast(),
            reconnect_attempts: stats.reconnect_attempts(),
            malformed_messages: stats.malformed_messages(),
        },
        subscribers: SubscriberStatus {
            total: state.relay.subscriber_count(),
        },
    }
}

const fn determine_health_status(state: SessionState) -> HealthStatus {
    match state {
        SessionState::Connected => HealthStatus::Healthy,
        SessionState::Simulating => HealthStatus::Degraded,
        SessionState::Disconnected | SessionState::Connecting | SessionState::ReconnectWait => {
            HealthStatus::Unhealthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn connected_maps_to_healthy() {
        assert_eq!(
            determine_health_status(SessionState::Connected),
            HealthStatus::Healthy
        );
    }

    #[test]
    fn simulating_maps_to_degraded() {
        assert_eq!(
            determine_health_status(SessionState::Simulating),
            HealthStatus::Degraded
        );
    }

    #[test]
    fn other_states_map_to_unhealthy() {
        for state in [
            SessionState::Disconnected,
            SessionState::Connecting,
            SessionState::ReconnectWait,
        ] {
            assert_eq!(determine_health_status(state), HealthStatus::Unhealthy);
        }
    }
}
