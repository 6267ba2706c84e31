//! Typed view on the frames exchanged after the handshake, plus the handshake payloads.
//!
//! Encoding follows the `[u8 message id][postcard payload]` layout documented in the crate
//! root. Messages without payload consist of the id byte only.

use crate::board::{Board, GameResult, Move, Symbol};
use crate::error::{ProtocolError, SessionError};
use crate::{
    ACKNOWLEDGE, CHAT, CHAT_LINE, CLIENT_LEAVES, HAND_SHAKE_RESPONSE, MOVE_REJECTED,
    OPPONENT_LEFT, PLACE_MARK, SERVER_ERROR, SESSION_CLOSED, SESSION_TIMED_OUT, STATE_UPDATE,
};
use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The first frame a client sends, postcard encoded without message id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Shown to the opponent and used as key for the win/loss statistics.
    pub player_name: String,
    /// The room to join or create. Empty means: match me with anyone who is waiting.
    pub room_id: String,
}

/// What the server tells a client after a successful join.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// The final room name, relevant when the client asked for auto matching.
    pub room_id: String,
    /// The symbol this client plays.
    pub symbol: Symbol,
}

/// The phases of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    WaitingForPlayers,
    InProgress,
    Terminal,
}

/// The broadcast after every change of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub board: Board,
    /// Whose move it is. Meaningless once `result` is terminal.
    pub turn: Symbol,
    pub result: GameResult,
    pub phase: SessionPhase,
    pub player_x: Option<String>,
    pub player_o: Option<String>,
    /// The move that lead to this state, if any.
    pub last_move: Option<Move>,
}

impl StateUpdate {
    /// Name of the player seated as `symbol`, if somebody is.
    pub fn player_name(&self, symbol: Symbol) -> Option<&str> {
        match symbol {
            Symbol::X => self.player_x.as_deref(),
            Symbol::O => self.player_o.as_deref(),
        }
    }
}

/// A relayed chat line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLine {
    pub from: String,
    pub text: String,
}

/// Why a running game ended for the remaining player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Departure {
    /// Always [`SessionError::ConnectionLost`] for now.
    pub error: SessionError,
    /// What happened to the other connection, for display.
    pub reason: String,
}

impl fmt::Display for Departure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.reason)
    }
}

/// Client -> Server messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientMessage {
    PlaceMark(Move),
    Chat(String),
    Acknowledge,
    Leave,
}

impl ClientMessage {
    /// The message id this message gets framed with.
    pub fn id(&self) -> u8 {
        match self {
            ClientMessage::PlaceMark(_) => PLACE_MARK,
            ClientMessage::Chat(_) => CHAT,
            ClientMessage::Acknowledge => ACKNOWLEDGE,
            ClientMessage::Leave => CLIENT_LEAVES,
        }
    }

    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let id = self.id();
        match self {
            ClientMessage::PlaceMark(mv) => frame_with_payload(id, mv),
            ClientMessage::Chat(text) => frame_with_payload(id, text),
            ClientMessage::Acknowledge | ClientMessage::Leave => Ok(frame_without_payload(id)),
        }
    }

    pub fn decode(frame: &[u8]) -> Result<ClientMessage, ProtocolError> {
        let (&id, payload) = frame.split_first().ok_or(ProtocolError::EmptyFrame)?;
        match id {
            PLACE_MARK => Ok(ClientMessage::PlaceMark(decode_payload(id, payload)?)),
            CHAT => Ok(ClientMessage::Chat(decode_payload(id, payload)?)),
            ACKNOWLEDGE => Ok(ClientMessage::Acknowledge),
            CLIENT_LEAVES => Ok(ClientMessage::Leave),
            _ => Err(ProtocolError::UnknownMessage { id }),
        }
    }
}

/// Server -> Client messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerMessage {
    Handshake(Handshake),
    State(StateUpdate),
    Rejected(SessionError),
    Chat(ChatLine),
    OpponentLeft(Departure),
    TimedOut,
    Closed,
    Error(String),
}

impl ServerMessage {
    /// The message id this message gets framed with.
    pub fn id(&self) -> u8 {
        match self {
            ServerMessage::Handshake(_) => HAND_SHAKE_RESPONSE,
            ServerMessage::State(_) => STATE_UPDATE,
            ServerMessage::Rejected(_) => MOVE_REJECTED,
            ServerMessage::Chat(_) => CHAT_LINE,
            ServerMessage::OpponentLeft(_) => OPPONENT_LEFT,
            ServerMessage::TimedOut => SESSION_TIMED_OUT,
            ServerMessage::Closed => SESSION_CLOSED,
            ServerMessage::Error(_) => SERVER_ERROR,
        }
    }

    /// True for the messages after which the server closes the connection.
    pub fn ends_connection(&self) -> bool {
        matches!(
            self,
            ServerMessage::OpponentLeft(_)
                | ServerMessage::TimedOut
                | ServerMessage::Closed
                | ServerMessage::Error(_)
        )
    }

    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let id = self.id();
        match self {
            ServerMessage::Handshake(handshake) => frame_with_payload(id, handshake),
            ServerMessage::State(state) => frame_with_payload(id, state),
            ServerMessage::Rejected(error) => frame_with_payload(id, error),
            ServerMessage::Chat(line) => frame_with_payload(id, line),
            ServerMessage::OpponentLeft(departure) => frame_with_payload(id, departure),
            ServerMessage::TimedOut | ServerMessage::Closed => Ok(frame_without_payload(id)),
            // Plain text, so that even a client with a broken decoder can show something.
            ServerMessage::Error(text) => {
                let mut msg = BytesMut::with_capacity(1 + text.len());
                msg.put_u8(id);
                msg.put_slice(text.as_bytes());
                Ok(msg.freeze())
            }
        }
    }

    pub fn decode(frame: &[u8]) -> Result<ServerMessage, ProtocolError> {
        let (&id, payload) = frame.split_first().ok_or(ProtocolError::EmptyFrame)?;
        match id {
            HAND_SHAKE_RESPONSE => Ok(ServerMessage::Handshake(decode_payload(id, payload)?)),
            STATE_UPDATE => Ok(ServerMessage::State(decode_payload(id, payload)?)),
            MOVE_REJECTED => Ok(ServerMessage::Rejected(decode_payload(id, payload)?)),
            CHAT_LINE => Ok(ServerMessage::Chat(decode_payload(id, payload)?)),
            OPPONENT_LEFT => Ok(ServerMessage::OpponentLeft(decode_payload(id, payload)?)),
            SESSION_TIMED_OUT => Ok(ServerMessage::TimedOut),
            SESSION_CLOSED => Ok(ServerMessage::Closed),
            SERVER_ERROR => Ok(ServerMessage::Error(
                String::from_utf8_lossy(payload).to_string(),
            )),
            _ => Err(ProtocolError::UnknownMessage { id }),
        }
    }
}

fn frame_without_payload(id: u8) -> Bytes {
    Bytes::copy_from_slice(&[id])
}

fn frame_with_payload<T: Serialize>(id: u8, payload: &T) -> Result<Bytes, ProtocolError> {
    let serialized = postcard::to_stdvec(payload).map_err(|e| ProtocolError::Encoding {
        id,
        reason: e.to_string(),
    })?;
    let mut msg = BytesMut::with_capacity(1 + serialized.len());
    msg.put_u8(id);
    msg.put_slice(&serialized);
    Ok(msg.freeze())
}

fn decode_payload<T: DeserializeOwned>(id: u8, payload: &[u8]) -> Result<T, ProtocolError> {
    postcard::from_bytes(payload).map_err(|e| ProtocolError::MalformedPayload {
        id,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MoveError;

    #[test]
    fn place_mark_frame_starts_with_id() {
        let frame = ClientMessage::PlaceMark(Move::new(Symbol::O, 2, 1))
            .encode()
            .unwrap();
        assert_eq!(frame[0], PLACE_MARK);
        assert_eq!(
            ClientMessage::decode(&frame).unwrap(),
            ClientMessage::PlaceMark(Move::new(Symbol::O, 2, 1))
        );
    }

    #[test]
    fn payloadless_messages_are_one_byte() {
        assert_eq!(ClientMessage::Leave.encode().unwrap().as_ref(), &[CLIENT_LEAVES]);
        assert_eq!(ServerMessage::Closed.encode().unwrap().as_ref(), &[SESSION_CLOSED]);
    }

    #[test]
    fn rejection_keeps_the_reason() {
        let error = SessionError::InvalidMove(MoveError::CellOccupied { row: 1, column: 1 });
        let frame = ServerMessage::Rejected(error).encode().unwrap();
        assert_eq!(ServerMessage::decode(&frame).unwrap(), ServerMessage::Rejected(error));
    }

    #[test]
    fn server_error_is_plain_text() {
        let frame = ServerMessage::Error("Room is full.".into()).encode().unwrap();
        assert_eq!(&frame[1..], b"Room is full.");
    }

    #[test]
    fn departure_carries_the_error_kind() {
        let departure = Departure {
            error: SessionError::ConnectionLost,
            reason: "Connection lost.".into(),
        };
        let message = ServerMessage::OpponentLeft(departure.clone());
        assert!(message.ends_connection());
        let frame = message.encode().unwrap();
        assert_eq!(frame[0], OPPONENT_LEFT);
        assert_eq!(
            ServerMessage::decode(&frame).unwrap(),
            ServerMessage::OpponentLeft(departure.clone())
        );
        assert_eq!(
            departure.to_string(),
            "the connection to the other player was lost (Connection lost.)"
        );
    }

    #[test]
    fn empty_and_unknown_frames_fail() {
        assert_eq!(ClientMessage::decode(&[]), Err(ProtocolError::EmptyFrame));
        assert_eq!(
            ClientMessage::decode(&[42]),
            Err(ProtocolError::UnknownMessage { id: 42 })
        );
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let frame = ClientMessage::PlaceMark(Move::new(Symbol::X, 0, 0))
            .encode()
            .unwrap();
        let result = ClientMessage::decode(&frame[..1]);
        assert!(matches!(
            result,
            Err(ProtocolError::MalformedPayload { id: PLACE_MARK, .. })
        ));
    }
}
