//! # Live Event Stream
//!
//! `GET /ws` upgrades to a WebSocket that receives every committed event as
//! a JSON text frame:
//!
//! ```json
//! { "kind": "newSale", "relatedId": "SALE/2025/03/001", "message": "...", ... }
//! ```
//!
//! The stream is one-way. Client frames other than ping and close are
//! ignored. A subscriber that falls behind by more than `event_buffer`
//! events skips the missed ones; the notification log still has them.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::state::AppState;

/// `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.events.subscribe();
    info!(subscribers = state.events.receiver_count(), "Event stream opened");

    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Message>(64);

    let outgoing_handle = tokio::spawn(async move {
        while let Some(msg) = outgoing_rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let forward_tx = outgoing_tx.clone();
    let forward_handle = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        if forward_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(?e, kind = %event.kind, "Event not serializable"),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    loop {
        match receiver.next().await {
            Some(Ok(Message::Ping(data))) => {
                if outgoing_tx.send(Message::Pong(data)).await.is_err() {
                    debug!("Outgoing task gone, closing stream");
                    break;
                }
            }
            Some(Ok(Message::Close(_))) => {
                debug!("Subscriber requested close");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(?e, "WebSocket error");
                break;
            }
            None => break,
        }
    }

    forward_handle.abort();
    outgoing_handle.abort();
    info!("Event stream closed");
}
