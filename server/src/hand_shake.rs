//! This module does the whole initialization and handshake thing.
//! The general protocol of connecting is :
//! Client -> Websocket: postcard serialized join request.
//! Websocket -> Client: HAND_SHAKE_RESPONSE with room name and assigned symbol,
//! or SERVER_ERROR followed by closing the socket.

use crate::lobby::AppState;
use crate::session_task::{Outbound, SessionEvent};
use axum::extract::ws::Message::Binary;
use axum::extract::ws::{Message, WebSocket};
use common::{
    Handshake, JoinRequest, MAX_PLAYER_NAME_LENGTH, MAX_ROOM_NAME_LENGTH, ServerMessage,
    SessionError, Symbol,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{sink::SinkExt, stream::StreamExt};
use postcard::from_bytes;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::Sender;
use tokio::sync::{broadcast, oneshot};

/// How often an auto matching player is moved on to another room after losing a race for a
/// seat.
const MAX_JOIN_ATTEMPTS: usize = 3;

/// Is called on error, sends the reason as a SERVER_ERROR frame, because the client can not
/// interpret closing messages, then closes the socket.
pub async fn send_closing_message(sender: &mut SplitSink<WebSocket, Message>, closing_message: String) {
    match ServerMessage::Error(closing_message).encode() {
        Ok(frame) => {
            let _ = sender.send(Message::Binary(frame)).await;
        }
        Err(error) => tracing::error!(%error, "Could not encode closing message."),
    }
    let _ = sender.send(Message::Close(None)).await;
}

/// The handshake result we get for joining a session.
pub struct HandshakeResult {
    /// The symbol the player got.
    pub seat: Symbol,
    /// The name of the player.
    pub player_name: String,
    /// The name of the room as stored in the hashmap.
    pub room_id: String,
    /// The queue into the session task.
    pub to_session: Sender<SessionEvent>,
    /// The subscription to the session broadcasts.
    pub from_session: broadcast::Receiver<Outbound>,
}

/// This data is data we need to keep for the disconnect handling and cleanup.
pub struct DisconnectData {
    /// The symbol the player had.
    pub seat: Symbol,
    /// The name of the room as stored in the hashmap.
    pub room_id: String,
    /// Where to report the departure.
    pub sender: Sender<SessionEvent>,
}

/// Construction of DisconnectData from Handshake result.
impl From<&HandshakeResult> for DisconnectData {
    fn from(value: &HandshakeResult) -> Self {
        DisconnectData {
            seat: value.seat,
            room_id: value.room_id.clone(),
            sender: value.to_session.clone(),
        }
    }
}

/// Reads in the join request from the web socket and checks the player name.
async fn get_join_request(
    sender: &mut SplitSink<WebSocket, Message>,
    receiver: &mut SplitStream<WebSocket>,
) -> Option<JoinRequest> {
    // The join request is the first binary message we receive.
    let my_data = loop {
        let Some(raw_data) = receiver.next().await else {
            tracing::warn!("WebSocket closed before handshake completed");
            return None;
        };
        match raw_data {
            Err(err) => {
                tracing::error!(?err, "Initial error during handshake.");
                send_closing_message(sender, "Initial error during handshake.".into()).await;
                return None;
            }
            Ok(Binary(data)) => {
                break data;
            }
            // We do not care about any other message like ping pong messages.
            Ok(_) => {}
        }
    };

    let mut request = match from_bytes::<JoinRequest>(&my_data) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(error = ?e, "Failed to parse join request");
            send_closing_message(sender, "Failed to parse join request.".into()).await;
            return None;
        }
    };

    request.player_name = request.player_name.trim().to_string();
    request.room_id = request.room_id.trim().to_string();
    if request.player_name.is_empty() || request.player_name.chars().count() > MAX_PLAYER_NAME_LENGTH {
        // User error no need for error tracing.
        send_closing_message(
            sender,
            format!(
                "Player names need between 1 and {} characters.",
                MAX_PLAYER_NAME_LENGTH
            ),
        )
        .await;
        return None;
    }
    if request.room_id.chars().count() > MAX_ROOM_NAME_LENGTH {
        send_closing_message(
            sender,
            format!(
                "Room names may have at most {} characters.",
                MAX_ROOM_NAME_LENGTH
            ),
        )
        .await;
        return None;
    }
    Some(request)
}

/// Reads the join request and gets the player seated in a session.
pub async fn init_and_connect(
    sender: &mut SplitSink<WebSocket, Message>,
    receiver: &mut SplitStream<WebSocket>,
    state: Arc<AppState>,
) -> Option<HandshakeResult> {
    let request = get_join_request(sender, receiver).await?;
    let auto_match = request.room_id.is_empty();
    let mut tried = Vec::new();

    for _ in 0..MAX_JOIN_ATTEMPTS {
        let room = match state.find_or_create_room(&request.room_id, &tried).await {
            Ok(room) => room,
            Err(message) => {
                send_closing_message(sender, message).await;
                return None;
            }
        };

        // Subscribe before asking for a seat, so the first state broadcast is not missed.
        let from_session = room.session_broadcaster.subscribe();
        let (reply, answer) = oneshot::channel();
        let join = SessionEvent::Join {
            name: request.player_name.clone(),
            reply,
        };
        if room.to_session_sender.send(join).await.is_err() {
            // The session ended between lookup and join, the next lookup replaces the room.
            tracing::debug!(room_id = %room.room_id, "Session ended during handshake.");
            continue;
        }

        match answer.await {
            Ok(Ok(seat)) => {
                tracing::info!(room_id = %room.room_id, player = %request.player_name, %seat, "Player joined.");
                return Some(HandshakeResult {
                    seat,
                    player_name: request.player_name,
                    room_id: room.room_id,
                    to_session: room.to_session_sender,
                    from_session,
                });
            }
            Ok(Err(SessionError::SessionFull)) if auto_match => {
                // Someone else took the seat first. Look for another room.
                tried.push(room.room_id);
                continue;
            }
            Ok(Err(error)) => {
                send_closing_message(
                    sender,
                    format!("Could not join room {}: {}.", room.room_id, error),
                )
                .await;
                return None;
            }
            Err(_) => continue,
        }
    }

    tracing::warn!(player = %request.player_name, "No seat found after several attempts.");
    send_closing_message(sender, "Could not find a free seat.".into()).await;
    None
}

/// Informs the player of the connection result, returns a bool as a success flag.
pub async fn inform_client_of_connection(
    sender: &mut SplitSink<WebSocket, Message>,
    status: &HandshakeResult,
) -> bool {
    let message = ServerMessage::Handshake(Handshake {
        room_id: status.room_id.clone(),
        symbol: status.seat,
    });
    let Ok(frame) = message.encode() else {
        return false;
    };
    let result = sender.send(Message::Binary(frame)).await;
    result.is_ok()
}

/// Performs the shutdown of the connection: tells the session that the player is gone and
/// closes the socket, with an error text first if the connection ended abnormally.
pub async fn shutdown_connection(
    wrapped_sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    disconnect_data: DisconnectData,
    outcome: Result<&'static str, &'static str>,
) {
    let reason = match outcome {
        Ok(reason) | Err(reason) => reason,
    };
    // The session may already be gone, then there is nobody left to inform.
    let _ = disconnect_data
        .sender
        .send(SessionEvent::PlayerLeft {
            seat: disconnect_data.seat,
            reason,
        })
        .await;
    tracing::debug!(room_id = %disconnect_data.room_id, seat = %disconnect_data.seat, reason, "Connection shut down.");

    let mut sender = wrapped_sender.lock().await;
    match outcome {
        Ok(_) => {
            let _ = sender.send(Message::Close(None)).await;
        }
        Err(error_message) => send_closing_message(&mut sender, error_message.into()).await,
    }
}
