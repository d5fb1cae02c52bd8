//! WebSocket handler: bidirectional message relay.
//!
//! DESIGN
//! ======
//! On upgrade, creates a bounded outbox and a `Session`, then enters a
//! `select!` loop:
//! - Incoming client messages → session state machine → direct replies
//! - Room broadcasts queued on the outbox → forward to client
//!
//! The session owns every room mutation. This module only moves bytes.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → session starts unjoined
//! 2. `join` → welcome written directly, peers notified through their outboxes
//! 3. Other messages → applied under the registry lock, broadcast to peers
//! 4. Re-join → the old outbox receiver is swapped for the new room's
//! 5. Close, socket error or a closed outbox → session leaves its room → cleanup

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use protocol::ServerMessage;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::services::session::Session;
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    // Per-connection channel for receiving broadcasts from room peers.
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<ServerMessage>(state.config.outbox_capacity);
    let mut session = Session::new(outbox_tx, state.config.default_room.clone());

    info!("ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(e) => {
                        debug!(error = %e, "ws: receive failed");
                        break;
                    }
                };
                let replies = match msg {
                    Message::Text(text) => session.handle_text(&state, text.as_str()).await,
                    Message::Binary(bytes) => session.handle_bytes(&state, &bytes).await,
                    Message::Close(_) => break,
                    _ => continue,
                };
                if let Some(rebound) = session.take_rebound_outbox() {
                    outbox_rx = rebound;
                }
                if send_all(&mut socket, &replies).await.is_err() {
                    break;
                }
            }
            message = outbox_rx.recv() => {
                // The room dropped our sender: evicted for falling behind.
                let Some(message) = message else {
                    warn!("ws: outbox closed by room, disconnecting");
                    break;
                };
                if send_message(&mut socket, &message).await.is_err() {
                    break;
                }
            }
        }
    }

    let participant_id = session.membership().map(|m| m.participant_id);
    session.close(&state).await;
    info!(?participant_id, "ws: client disconnected");
}

// =============================================================================
// OUTBOUND
// =============================================================================

async fn send_all(socket: &mut WebSocket, messages: &[ServerMessage]) -> Result<(), axum::Error> {
    for message in messages {
        send_message(socket, message).await?;
    }
    Ok(())
}

/// Serialize and write one message. Serialization failures are logged and
/// skipped; socket failures end the connection.
async fn send_message(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    let json = match protocol::encode(message) {
        Ok(json) => json,
        Err(e) => {
            warn!(kind = message.kind(), error = %e, "ws: failed to serialize message");
            return Ok(());
        }
    };
    match message {
        ServerMessage::CursorUpdate { .. } | ServerMessage::Draw(_) => {}
        ServerMessage::Error { code, message } => warn!(%code, %message, "ws: send error"),
        other => debug!(kind = other.kind(), "ws: send message"),
    }
    socket.send(Message::Text(json.into())).await
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
