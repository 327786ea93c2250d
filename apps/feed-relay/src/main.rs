//! Feed Relay Binary
//!
//! Starts the market data relay.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin feed-relay
//! ```
//!
//! # Environment Variables
//!
//! All optional:
//! - `OKX_WS_URL`: Upstream feed URL (default: `wss://ws.okx.com:8443/ws/v5/public`)
//! - `FEED_RELAY_INSTRUMENT`: Instrument to subscribe (default: BTC-USDT-SWAP)
//! - `FEED_RELAY_HTTP_PORT`: HTTP port (default: 5000)
//! - `FEED_RELAY_ARCHIVE_ENABLED`: Archive feed data (default: true)
//! - `FEED_RELAY_ARCHIVE_DIR`: Archive directory (default: data)
//! - `FEED_RELAY_BACKOFF_BASE_SECS` / `FEED_RELAY_BACKOFF_MAX_SECS` /
//!   `FEED_RELAY_SIMULATE_AFTER_SECS`: Backoff tuning (defaults: 5 / 60 / 20)
//! - `RUST_LOG`: Log level (default: info)
//! - `LOG_FORMAT`: Set to `json` for JSON logs

use std::sync::Arc;

use feed_relay::infrastructure::archive::JsonlArchive;
use feed_relay::infrastructure::http::{ApiServer, AppState};
use feed_relay::infrastructure::relay::RelaySupervisor;
use feed_relay::infrastructure::telemetry;
use feed_relay::{FeedArchive, RelayConfig, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();
    telemetry::init();
    let _metrics_handle = init_metrics();

    tracing::info!("starting feed relay");

    let config = RelayConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // A missing archive degrades to no archiving; it never blocks the feed.
    let archive: Option<Arc<dyn FeedArchive>> = if config.archive.enabled {
        match JsonlArchive::open(&config.archive.data_dir, &config.upstream.instrument).await {
            Ok(archive) => Some(Arc::new(archive)),
            Err(e) => {
                tracing::error!(error = %e, "archive unavailable, continuing without it");
                None
            }
        }
    } else {
        None
    };

    let supervisor = Arc::new(RelaySupervisor::start(config.session_config(), archive));

    let state = AppState::new(
        supervisor.handle(),
        env!("CARGO_PKG_VERSION"),
        config.delivery.subscriber_buffer,
    );
    let server = ApiServer::bind(config.server.http_port, state, shutdown_token.clone()).await?;

    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!(error = %e, "http server error");
        }
    });

    tracing::info!("feed relay ready");

    await_shutdown(&shutdown_token).await;
    supervisor.stop().await;

    tracing::info!("feed relay stopped");
    Ok(())
}

/// Load a .env file from the current directory or any ancestor.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        url = %config.upstream.url,
        instrument = %config.upstream.instrument,
        http_port = config.server.http_port,
        archive_enabled = config.archive.enabled,
        "configuration loaded"
    );
}

/// Wait for a shutdown signal (SIGTERM or SIGINT), then cancel.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: &CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received ctrl-c, shutting down");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }

    shutdown_token.cancel();
}
