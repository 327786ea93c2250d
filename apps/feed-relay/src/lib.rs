#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Feed Relay - OKX Market Data Relay
//!
//! Maintains a single connection to OKX's public WebSocket feed, normalizes
//! the stream into canonical ticker/trade events, and fans them out to any
//! number of local WebSocket subscribers. Upstream failures are absorbed by
//! exponential-backoff reconnection; once the failure streak crosses a
//! threshold the session falls back, permanently, to a synthetic
//! random-walk generator feeding the same broadcast path.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Canonical events and session states
//!   - `event`: Ticker/trade event model
//!   - `session`: Session state vocabulary
//!
//! - **Application**: Port definitions
//!   - `ports`: Archive collaborator contract
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `okx`: Upstream session, normalizer, backoff policy, simulator
//!   - `relay`: Subscriber registry and supervisor
//!   - `archive`: JSONL archive and fire-and-forget writer
//!   - `http`: REST API, downstream WebSocket, health surface
//!   - `config`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//! OKX WS ──► Normalizer ──► CanonicalEvent ──┐
//!                                            ├──► Registry ──► Client 1
//! Synthetic Generator ──► CanonicalEvent ────┘        │  ────► Client 2
//!   (after fallback)                                  ▼  ────► Client N
//!                                              Archive (JSONL)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Canonical events and session states.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::event::{BookLevel, CanonicalEvent, TickerEvent, TradeEvent, TradeSide};
pub use domain::session::SessionState;

// Ports
pub use application::ports::{ArchiveError, FeedArchive};

// Relay core
pub use infrastructure::relay::{RelayHandle, RelaySupervisor, SubscriberId, SubscriberRegistry};

// Upstream session
pub use infrastructure::okx::{
    BackoffConfig, BackoffDecision, BackoffPolicy, FeedSessionConfig, Normalizer, NormalizerError,
    SessionStats, SimulatorConfig, SyntheticFeed,
};

// Archive adapters
pub use infrastructure::archive::{ArchiveHandle, InMemoryArchive, JsonlArchive};

// Configuration
pub use infrastructure::config::{ConfigError, RelayConfig};

// HTTP server
pub use infrastructure::http::{ApiServer, ApiServerError, AppState};

// Metrics
pub use infrastructure::metrics::{get_metrics_handle, init_metrics};

// Telemetry
pub use infrastructure::telemetry::init as init_telemetry;
