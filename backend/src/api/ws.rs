//! Live event channel
//!
//! Upgrades /api/ws connections and registers them with the subscriber
//! registry. Client frames are read only to detect liveness; events flow
//! server to client through the registry channel.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};

use crate::AppState;

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single connection after upgrade: register it, forward registry
/// messages to the sink from a spawned task, and drain inbound frames until
/// the peer goes away.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (id, mut rx) = state.engine.subscribers.add();
    tracing::info!(
        subscriber = %id,
        total = state.engine.subscribers.count(),
        "Live subscriber connected"
    );

    let (mut sink, mut stream) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
        // Registry channel ended or the write failed: close the transport.
        let _ = sink.close().await;
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) | Err(_) => break,
            // Inbound frames only prove the peer is alive.
            Ok(_) => {}
        }
    }

    state.engine.subscribers.remove(id);
    send_task.abort();
    tracing::info!(
        subscriber = %id,
        total = state.engine.subscribers.count(),
        "Live subscriber disconnected"
    );
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/ws", get(ws_handler))
}
