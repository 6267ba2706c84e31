//! The task that owns a [`Session`] for its whole lifetime.
//!
//! Connection tasks never touch the session directly. They push [`SessionEvent`]s into the
//! session's mpsc queue and receive [`Outbound`] frames from its broadcast channel, so every
//! mutation of a board happens in exactly one place and near simultaneous moves of both players
//! are serialized by the queue.
//!
//! ```text
//! connection X ──┐                                ┌──► connection X (filters by seat)
//!                ├─► mpsc ─► session task ─► broadcast
//! connection O ──┘                                └──► connection O (filters by seat)
//! ```

use crate::session::Session;
use bytes::Bytes;
use common::{
    ChatLine, ClientMessage, Departure, GameResult, MAX_CHAT_LENGTH, ServerMessage, SessionError,
    SessionPhase, Symbol,
};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Everything a connection can tell its session.
#[derive(Debug)]
pub enum SessionEvent {
    /// A player wants a seat. The session answers with the assigned symbol.
    Join {
        name: String,
        reply: oneshot::Sender<Result<Symbol, SessionError>>,
    },
    /// A decoded message from a seated player.
    Command { seat: Symbol, message: ClientMessage },
    /// The connection of a seated player is gone.
    PlayerLeft { seat: Symbol, reason: &'static str },
}

/// Who a broadcast frame is meant for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recipient {
    Everyone,
    Only(Symbol),
}

/// A frame on the session's broadcast channel.
#[derive(Clone, Debug)]
pub struct Outbound {
    pub recipient: Recipient,
    pub frame: Bytes,
    /// The connection task ends after forwarding this frame.
    pub closes_connection: bool,
}

impl Outbound {
    pub fn is_for(&self, seat: Symbol) -> bool {
        match self.recipient {
            Recipient::Everyone => true,
            Recipient::Only(target) => target == seat,
        }
    }
}

/// What the lobby shows about a room. Published by the session task after every change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomStatus {
    pub phase: SessionPhase,
    pub player_x: Option<String>,
    pub player_o: Option<String>,
}

impl Default for RoomStatus {
    fn default() -> Self {
        RoomStatus {
            phase: SessionPhase::WaitingForPlayers,
            player_x: None,
            player_o: None,
        }
    }
}

/// Why a session task stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// The game reached a result and both players acknowledged or left.
    Finished,
    /// A player got lost while the game was running.
    PlayerLost,
    /// No event arrived within the idle timeout.
    TimedOut,
    /// Nobody is left or every sender was dropped before the game started.
    Abandoned,
}

/// The summary a session task hands back when it stops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOutcome {
    pub end: SessionEnd,
    pub result: GameResult,
    pub player_x: Option<String>,
    pub player_o: Option<String>,
}

/// The channel ends a session task works with.
pub struct SessionChannels {
    pub events: mpsc::Receiver<SessionEvent>,
    pub broadcaster: broadcast::Sender<Outbound>,
    pub status: watch::Sender<RoomStatus>,
}

/// Drives one session until it is finished, abandoned or idle for longer than `idle_timeout`.
pub async fn run_session(
    room_id: String,
    channels: SessionChannels,
    idle_timeout: Duration,
) -> SessionOutcome {
    let SessionChannels {
        mut events,
        broadcaster,
        status,
    } = channels;
    let mut runner = SessionRunner {
        room_id,
        session: Session::new(),
        broadcaster,
        status,
    };

    let end = loop {
        let event = match tokio::time::timeout(idle_timeout, events.recv()).await {
            Err(_) => {
                tracing::info!(room_id = %runner.room_id, "Session idle for too long.");
                runner.send(Recipient::Everyone, ServerMessage::TimedOut);
                break SessionEnd::TimedOut;
            }
            Ok(None) => break SessionEnd::Abandoned,
            Ok(Some(event)) => event,
        };
        if let Some(end) = runner.handle(event) {
            break end;
        }
    };

    tracing::info!(room_id = %runner.room_id, ?end, result = ?runner.session.result(), "Session ended.");
    SessionOutcome {
        end,
        result: runner.session.result(),
        player_x: runner.session.player_name(Symbol::X).map(str::to_string),
        player_o: runner.session.player_name(Symbol::O).map(str::to_string),
    }
}

/// The mutable state of a running session task.
struct SessionRunner {
    room_id: String,
    session: Session,
    broadcaster: broadcast::Sender<Outbound>,
    status: watch::Sender<RoomStatus>,
}

impl SessionRunner {
    /// Processes one event. Returns the reason to stop, if the session is over.
    fn handle(&mut self, event: SessionEvent) -> Option<SessionEnd> {
        match event {
            SessionEvent::Join { name, reply } => self.join(name, reply),
            SessionEvent::Command { seat, message } => match message {
                ClientMessage::PlaceMark(mv) => {
                    match self.session.submit_move(seat, &mv) {
                        Ok(result) => {
                            tracing::debug!(room_id = %self.room_id, %mv, "Move accepted.");
                            if result.is_terminal() {
                                tracing::info!(room_id = %self.room_id, %result, "Game over.");
                            }
                            self.publish_state();
                        }
                        Err(error) => {
                            tracing::debug!(room_id = %self.room_id, %mv, %error, "Move rejected.");
                            self.send(Recipient::Only(seat), ServerMessage::Rejected(error));
                        }
                    }
                    None
                }
                ClientMessage::Chat(text) => {
                    let from = self.session.player_name(seat).unwrap_or_default().to_string();
                    let text: String = text.chars().take(MAX_CHAT_LENGTH).collect();
                    self.send(Recipient::Everyone, ServerMessage::Chat(ChatLine { from, text }));
                    None
                }
                ClientMessage::Acknowledge => {
                    if self.session.acknowledge(seat) {
                        self.send(Recipient::Everyone, ServerMessage::Closed);
                        return Some(SessionEnd::Finished);
                    }
                    None
                }
                ClientMessage::Leave => self.departure(seat, "Opponent left the session."),
            },
            SessionEvent::PlayerLeft { seat, reason } => self.departure(seat, reason),
        }
    }

    fn join(
        &mut self,
        name: String,
        reply: oneshot::Sender<Result<Symbol, SessionError>>,
    ) -> Option<SessionEnd> {
        let seat = self.session.seat_player(name);
        let seated = seat.ok();
        if reply.send(seat).is_err() {
            // The connection died while waiting for the answer. Undo by treating it as gone.
            return seated.and_then(|seat| self.departure(seat, "Connection lost while joining."));
        }
        if let Some(seat) = seated {
            tracing::info!(room_id = %self.room_id, %seat, phase = ?self.session.phase(), "Player seated.");
            self.publish_state();
        }
        None
    }

    /// A seated player is gone, either on purpose or by connection loss.
    fn departure(&mut self, seat: Symbol, reason: &'static str) -> Option<SessionEnd> {
        tracing::info!(room_id = %self.room_id, %seat, reason, "Player departed.");
        match self.session.phase() {
            SessionPhase::Terminal => {
                // Leaving after the end counts as having seen the result.
                if self.session.acknowledge(seat) {
                    self.send(Recipient::Everyone, ServerMessage::Closed);
                    return Some(SessionEnd::Finished);
                }
                None
            }
            SessionPhase::InProgress => {
                self.send(
                    Recipient::Only(seat.other()),
                    ServerMessage::OpponentLeft(Departure {
                        error: SessionError::ConnectionLost,
                        reason: reason.to_string(),
                    }),
                );
                Some(SessionEnd::PlayerLost)
            }
            SessionPhase::WaitingForPlayers => {
                self.send(Recipient::Everyone, ServerMessage::Closed);
                Some(SessionEnd::Abandoned)
            }
        }
    }

    /// Broadcasts the current state and updates the lobby view.
    fn publish_state(&mut self) {
        let snapshot = self.session.snapshot();
        self.status.send_replace(RoomStatus {
            phase: snapshot.phase,
            player_x: snapshot.player_x.clone(),
            player_o: snapshot.player_o.clone(),
        });
        self.send(Recipient::Everyone, ServerMessage::State(snapshot));
    }

    fn send(&self, recipient: Recipient, message: ServerMessage) {
        let closes_connection = message.ends_connection();
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(error) => {
                tracing::error!(room_id = %self.room_id, %error, "Could not encode message.");
                return;
            }
        };
        // Fails only if no connection is subscribed, which is fine while players come and go.
        if let Err(error) = self.broadcaster.send(Outbound {
            recipient,
            frame,
            closes_connection,
        }) {
            tracing::warn!(room_id = %self.room_id, ?error, "Sending to no players.");
        }
    }
}
