//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations behind the port
//! interfaces and all transport-facing code.

/// Archive adapters (JSONL files, in-memory double) and the writer task.
pub mod archive;

/// Configuration loading.
pub mod config;

/// Health check endpoints.
pub mod health;

/// HTTP server: REST API, downstream WebSocket, health surface.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OKX upstream adapters: session, normalizer, backoff, simulator.
pub mod okx;

/// Relay core: subscriber registry and supervisor.
pub mod relay;

/// Tracing initialization.
pub mod telemetry;
