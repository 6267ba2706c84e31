//! WebSocket message routing between a player connection and its session task.
//!
//! For each connection it spawns paired Tokio tasks that:
//! - Decode client frames and funnel them into the session queue (rejecting illegal commands)
//! - Forward session broadcasts meant for this player's seat to the socket
//!
//! The relay never interprets game logic. It only validates frames and routes them.

use crate::session_task::{Outbound, SessionEvent};
use axum::extract::ws::{Message, WebSocket};
use common::{ClientMessage, Symbol};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

/// Spawns the bidirectional message handlers for one seated player.
///
/// Creates two concurrent tasks:
/// - **Receive task**: Forwards player commands to the session
/// - **Send task**: Delivers session broadcasts addressed to this seat
///
/// When either task completes (connection lost, protocol error, session over), the other is
/// aborted and the caller shuts the connection down.
///
/// # Returns
/// `Ok` with a reason for an orderly end, `Err` with a reason the client should be shown.
pub async fn handle_player_logic(
    sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    receiver: SplitStream<WebSocket>,
    from_session: broadcast::Receiver<Outbound>,
    to_session: mpsc::Sender<SessionEvent>,
    seat: Symbol,
) -> Result<&'static str, &'static str> {
    let mut send_task =
        tokio::spawn(async move { send_logic_player(sender, from_session, seat).await });

    let mut receive_task =
        tokio::spawn(async move { receive_logic_player(receiver, to_session, seat).await });

    // If any one of the tasks run to completion, we abort the other.
    let result = tokio::select! {
        res_a = &mut send_task => {receive_task.abort(); res_a},
        res_b = &mut receive_task => {send_task.abort(); res_b},
    };

    result.unwrap_or_else(|err| {
        tracing::error!(?err, "Internal panic in player side logic.");
        Err("Internal panic in player side logic.")
    })
}

/// Receives frames from the player and forwards them to the session.
///
/// Allowed message types from the player:
/// - `PLACE_MARK`, `CHAT`, `ACKNOWLEDGE`: handed to the session tagged with the seat
/// - `CLIENT_LEAVES`: handed to the session as well, then the connection ends
///
/// Anything that does not decode is a protocol violation and ends the connection.
async fn receive_logic_player(
    mut receiver: SplitStream<WebSocket>,
    to_session: mpsc::Sender<SessionEvent>,
    seat: Symbol,
) -> Result<&'static str, &'static str> {
    while let Some(state) = receiver.next().await {
        match state {
            Ok(Message::Binary(bytes)) => {
                let message = match ClientMessage::decode(&bytes) {
                    Ok(message) => message,
                    Err(error) => {
                        tracing::error!(%error, %seat, "Illegal message from player.");
                        return Err("Illegal message from client.");
                    }
                };
                let leaves = message == ClientMessage::Leave;
                let res = to_session.send(SessionEvent::Command { seat, message }).await;
                if leaves {
                    return Ok("Client left intentionally.");
                }
                if res.is_err() {
                    // The session is over. The send task still delivers the final frames
                    // and ends this connection.
                    tracing::debug!(%seat, "Dropping command for ended session.");
                }
            }
            Ok(_) => {} // Ignore other messages (ping/pong handled by axum)
            Err(_) => {
                return Ok("Connection lost.");
            }
        }
    }
    Ok("Connection lost.")
}

/// Delivers session broadcasts to this player.
///
/// Frames addressed to the other seat are skipped. After a frame flagged as closing the
/// connection (opponent left, timeout, session closed) the task ends.
///
/// # Error Handling
/// Returns immediately if the broadcast channel lags, as the client cannot recover from
/// missed state.
async fn send_logic_player(
    sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    mut from_session: broadcast::Receiver<Outbound>,
    seat: Symbol,
) -> Result<&'static str, &'static str> {
    let mut enclosed = sender.lock().await;

    loop {
        match from_session.recv().await {
            Err(RecvError::Closed) => {
                return Ok("Session ended.");
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    skipped_messages = skipped,
                    "Lagging started on session channel."
                );
                return Err("Lagging on session channel - Computer too slow.");
            }
            Ok(outbound) => {
                if !outbound.is_for(seat) {
                    continue;
                }
                let res = enclosed.send(Message::Binary(outbound.frame)).await;
                if let Err(error) = res {
                    tracing::error!(?error, "Error in communication with player endpoint.");
                    return Ok("Error in communication with player endpoint.");
                }
                if outbound.closes_connection {
                    return Ok("Session ended.");
                }
            }
        }
    }
}
