//! WebSocket session channel for browser clients.
//!
//! Endpoint: GET /ws/{client_id}
//!
//! Flow:
//! 1. Client connects with its own id; the server registers an outbound
//!    queue for it (replacing any previous connection with the same id)
//! 2. Download/upload requests tagged `?websocket_id=<id>` push progress
//!    through that queue
//! 3. Client may send `{"type": "start_test", "test_type": "latency"}`;
//!    the latency test runs in its own task and streams progress back
//! 4. On close the registration is released

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::stream::StreamExt;
use tokio::sync::mpsc;

use speedtest_common::models::TestType;
use speedtest_common::protocol::ClientCommand;

use crate::state::AppState;

/// Outbound queue depth per client.
const OUTBOUND_QUEUE: usize = 64;

/// Axum handler - upgrades HTTP to WebSocket.
pub async fn handler(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, client_id, socket))
}

async fn handle_socket(state: AppState, client_id: String, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
    let session = state.progress().register(&client_id, tx);

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&state, &client_id, text.as_str());
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(client_id = %client_id, error = %e, "socket read failed");
                        break;
                    }
                    _ => {} // Ping/Pong handled by axum
                }
            }

            msg = rx.recv() => {
                match msg {
                    Some(text) => {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    // Replaced by a newer connection with the same id.
                    None => {
                        tracing::debug!(client_id = %client_id, "closing replaced socket");
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    state.progress().release(&client_id, session);
}

fn handle_client_message(state: &AppState, client_id: &str, text: &str) {
    let Some(command) = ClientCommand::parse(text) else {
        tracing::debug!(client_id = %client_id, "ignoring malformed message");
        return;
    };

    match command {
        ClientCommand::StartTest {
            test_type: TestType::Latency,
            ..
        } => {
            let state = state.clone();
            let client_id = client_id.to_string();
            tokio::spawn(async move {
                state.latency().run(&client_id).await;
            });
        }
        ClientCommand::StartTest { test_type, size_mb } => {
            // Throughput tests are driven over HTTP.
            tracing::debug!(
                client_id = %client_id,
                test_type = %test_type,
                size_mb,
                "ignoring start_test over session channel"
            );
        }
    }
}
