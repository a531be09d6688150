use axum::{
    body::Bytes,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::api::AppState;
use super::models::*;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── Change feed message types ────────────────────────────────────────

/// A committed board change, pushed to every connected client so it can
/// refresh the affected part of its view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BoardEvent {
    ProjectListUpdated,
    ColumnsUpdated {
        board_id: i64,
        columns: Vec<Column>,
    },
    TaskCreated {
        task: Task,
    },
    TaskMoved {
        task: Task,
        from_column: i64,
    },
    TaskUpdated {
        task: Task,
    },
    TaskDeleted {
        task_id: i64,
        column_id: i64,
    },
    TagsUpdated {
        project_id: i64,
    },
}

// ── WebSocket handler ────────────────────────────────────────────────

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    let rx = state.events_tx.subscribe();
    debug!(subscribers = state.events_tx.receiver_count(), "change feed client connected");
    run_socket_loop(sender, receiver, rx).await;
    debug!("change feed client disconnected");
}

/// Forward broadcast events to one client, with ping/pong keepalive.
///
/// The connection is dropped when no Pong arrives within [`PONG_TIMEOUT`]
/// of a Ping.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<String>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    break;
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Clients re-fetch on the next event anyway.
                        debug!(skipped, "change feed client lagged");
                        continue;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

// ── Broadcast helper ─────────────────────────────────────────────────

/// Serialize and broadcast an event to all connected clients.
/// Having no clients connected is not an error.
pub fn broadcast_event(tx: &broadcast::Sender<String>, event: &BoardEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            let _ = tx.send(json);
        }
        Err(e) => {
            warn!(error = %e, "failed to serialize board event");
        }
    }
}
