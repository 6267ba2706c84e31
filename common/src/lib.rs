//! Everything the server and the console client have to agree on: the board model with its
//! pure rule functions, the error kinds reported over the wire and the message framing.
//!
//! After the handshake every WebSocket frame is `[u8 message id][postcard payload]`. The ids
//! below are used consistently on both sides; the typed view on them lives in [`messages`].

pub mod board;
pub mod error;
pub mod messages;

pub use board::{BOARD_SIZE, Board, Cell, GameResult, Move, Symbol, apply_move, compute_result, validate_move};
pub use error::{MoveError, ProtocolError, SessionError};
pub use messages::{
    ChatLine, ClientMessage, Departure, Handshake, JoinRequest, ServerMessage, SessionPhase, StateUpdate,
};

/// The buffer sizes for the channels between the connection tasks and a session task.
pub const CHANNEL_BUFFER_SIZE: usize = 64;

/// Longest player name the server accepts in a join request.
pub const MAX_PLAYER_NAME_LENGTH: usize = 32;

/// Longest room name the server accepts in a join request.
pub const MAX_ROOM_NAME_LENGTH: usize = 32;

/// Longest chat line the server relays. Longer lines get truncated.
pub const MAX_CHAT_LENGTH: usize = 256;

// Client -> Server.

/// Place a mark, followed by a postcard encoded [`Move`].
pub const PLACE_MARK: u8 = 0;

/// A chat line for the opponent, followed by a postcard encoded string.
pub const CHAT: u8 = 1;

/// The client has seen the terminal result and is done with the session. No payload.
pub const ACKNOWLEDGE: u8 = 2;

/// The client leaves the session on purpose. No payload.
pub const CLIENT_LEAVES: u8 = 3;

// Server -> Client.

/// The response to the join request, followed by a postcard encoded [`Handshake`].
pub const HAND_SHAKE_RESPONSE: u8 = 0;

/// The authoritative state after every change, followed by a postcard encoded [`StateUpdate`].
pub const STATE_UPDATE: u8 = 1;

/// Only sent to the offending client, followed by a postcard encoded [`SessionError`].
pub const MOVE_REJECTED: u8 = 2;

/// A relayed chat line, followed by a postcard encoded [`ChatLine`].
pub const CHAT_LINE: u8 = 3;

/// The other player got lost while the game was running, followed by a postcard encoded
/// [`Departure`].
pub const OPPONENT_LEFT: u8 = 4;

/// The session saw no activity for too long and was shut down. No payload.
pub const SESSION_TIMED_OUT: u8 = 5;

/// The session is over and the connection gets closed. No payload.
pub const SESSION_CLOSED: u8 = 6;

/// Error text in UTF-8, sent right before the server closes the socket.
pub const SERVER_ERROR: u8 = 7;
