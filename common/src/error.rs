//! The error kinds shared by both ends. [`MoveError`] and [`SessionError`] travel over the wire
//! inside a `MOVE_REJECTED` message, [`ProtocolError`] stays local to whoever decodes a frame.

use crate::board::Symbol;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

/// Why a single move does not fit the board or the turn order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, Error, Serialize, Deserialize)]
pub enum MoveError {
    #[display("it is {expected}'s turn")]
    WrongTurn { expected: Symbol },
    #[display("you play {seat} in this session")]
    WrongSymbol { seat: Symbol },
    #[display("cell ({row}, {column}) is not on the board")]
    OutOfBounds { row: u8, column: u8 },
    #[display("cell ({row}, {column}) is already occupied")]
    CellOccupied { row: u8, column: u8 },
}

/// Everything a session can refuse. The session state is left unchanged in every case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, Error, Serialize, Deserialize)]
pub enum SessionError {
    #[display("invalid move: {_0}")]
    InvalidMove(MoveError),
    #[display("the game is already over")]
    GameOver,
    #[display("waiting for an opponent to join")]
    WaitingForOpponent,
    #[display("the session already has two players")]
    SessionFull,
    #[display("the connection to the other player was lost")]
    ConnectionLost,
}

impl From<MoveError> for SessionError {
    fn from(error: MoveError) -> Self {
        SessionError::InvalidMove(error)
    }
}

/// A frame that could not be turned into a message.
#[derive(Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum ProtocolError {
    #[display("empty frame")]
    EmptyFrame,
    #[display("unknown message id {id}")]
    UnknownMessage { id: u8 },
    #[display("malformed payload for message {id}: {reason}")]
    MalformedPayload { id: u8, reason: String },
    #[display("could not encode message {id}: {reason}")]
    Encoding { id: u8, reason: String },
}
