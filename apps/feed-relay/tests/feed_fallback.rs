//! Fallback behavior of the feed session under repeated connection
//! failures, driven on a paused clock so the backoff schedule is observed
//! in virtual time.

use std::time::Duration;

use feed_relay::infrastructure::okx::session::FeedSessionConfig;
use feed_relay::infrastructure::relay::RelaySupervisor;
use feed_relay::SessionState;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Nothing listens on port 1; every connect attempt fails.
fn unreachable_config() -> FeedSessionConfig {
    FeedSessionConfig {
        url: "ws://127.0.0.1:1".to_string(),
        ..FeedSessionConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn backoff_schedule_elapses_before_fallback_begins() {
    let started = tokio::time::Instant::now();
    let supervisor = RelaySupervisor::start(unreachable_config(), None);
    let handle = supervisor.handle();

    let (tx, mut rx) = mpsc::channel(64);
    handle.subscribe(tx);

    // No events until the synthetic generator takes over.
    let frame = timeout(Duration::from_secs(600), rx.recv())
        .await
        .expect("fallback should begin within the backoff schedule")
        .expect("subscriber should stay registered");

    let event: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(event["type"], "ticker");
    assert_eq!(event["symbol"], "BTC-USDT-SWAP");

    // Waits of 5, 10, and 20 time-units separate the three failures.
    assert!(
        started.elapsed() >= Duration::from_secs(35),
        "fallback began after only {:?}",
        started.elapsed()
    );
    assert_eq!(handle.state(), SessionState::Simulating);
    assert!(handle.stats().reconnect_attempts() >= 3);

    supervisor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn simulation_is_sticky_once_entered() {
    let supervisor = RelaySupervisor::start(unreachable_config(), None);
    let handle = supervisor.handle();

    let (tx, mut rx) = mpsc::channel(1024);
    handle.subscribe(tx);

    // Enter simulation.
    timeout(Duration::from_secs(600), rx.recv())
        .await
        .expect("fallback should begin")
        .expect("subscriber should stay registered");
    assert_eq!(handle.state(), SessionState::Simulating);

    // Events keep flowing and the session never leaves Simulating, even
    // though plenty of time passes for a reconnect attempt.
    for _ in 0..10 {
        let frame = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("synthetic ticks should keep arriving")
            .expect("subscriber should stay registered");
        let event: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert!(event["type"] == "ticker" || event["type"] == "trade");
        assert_eq!(handle.state(), SessionState::Simulating);
    }

    let reconnects_during_simulation = handle.stats().reconnect_attempts();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(
        handle.stats().reconnect_attempts(),
        reconnects_during_simulation,
        "the upstream must not be retried after fallback"
    );

    supervisor.stop().await;
    assert_eq!(handle.state(), SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn late_subscriber_receives_one_snapshot_before_the_next_tick() {
    let supervisor = RelaySupervisor::start(unreachable_config(), None);
    let handle = supervisor.handle();

    let (tx, mut rx) = mpsc::channel(64);
    handle.subscribe(tx);
    timeout(Duration::from_secs(600), rx.recv())
        .await
        .expect("fallback should begin")
        .expect("subscriber should stay registered");
    assert_eq!(handle.state(), SessionState::Simulating);

    // A subscriber joining mid-simulation is served immediately.
    let (late_tx, mut late_rx) = mpsc::channel(64);
    handle.subscribe(late_tx);

    let frame = timeout(Duration::from_millis(500), late_rx.recv())
        .await
        .expect("snapshot should arrive before the next scheduled tick")
        .expect("late subscriber should be registered");
    let event: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(event["type"], "ticker");

    // Exactly one frame until the next tick fires.
    assert!(late_rx.try_recv().is_err());

    supervisor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_during_backoff_wait_lands_on_disconnected() {
    let supervisor = RelaySupervisor::start(unreachable_config(), None);
    let handle = supervisor.handle();

    // Let the first failure happen and the session settle into its wait.
    tokio::time::sleep(Duration::from_secs(2)).await;

    supervisor.stop().await;
    assert_eq!(handle.state(), SessionState::Disconnected);

    // Idempotent.
    supervisor.stop().await;
    assert_eq!(handle.state(), SessionState::Disconnected);
}
