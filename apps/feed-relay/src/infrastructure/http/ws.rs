//! Downstream Subscriber Endpoint
//!
//! `GET /ws/market-data` upgrades to a WebSocket and streams JSON-encoded
//! canonical events until the client disconnects. Client frames are read
//! and discarded; the protocol is one-way.
//!
//! Each connection gets a bounded outbound queue registered with the
//! subscriber registry. The registry fills the queue without blocking; this
//! handler drains it into the socket. If the client stalls long enough for
//! the queue to fill, the registry prunes the subscription and the drain
//! loop ends.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::infrastructure::http::AppState;

/// `GET /ws/market-data`
pub async fn market_data_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(state.subscriber_buffer);
    let id = state.relay.subscribe(outbound_tx);
    tracing::info!(subscriber = %id, "market data client connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                match frame {
                    Some(text) => {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    // Registry pruned this subscription.
                    None => break,
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(subscriber = %id, error = %e, "client socket error");
                        break;
                    }
                }
            }
        }
    }

    state.relay.unsubscribe(&id);
    tracing::info!(subscriber = %id, "market data client disconnected");
}
