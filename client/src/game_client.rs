//! The game client takes care of the communication with the server and is the core entry point
//! of the console front end.
//!
//! It works heartbeat driven: the front end calls [`GameClient::update`] once per tick, then
//! polls [`GameClient::next_event`] until it is drained, renders, and hands user input back via
//! [`GameClient::place_mark`], [`GameClient::send_chat`] and friends. Outgoing messages are
//! queued and flushed on the next update.
//!
//! ```text
//! AwaitingHandshake --join request sent--> ExecutingHandshake --handshake--> Connected
//!         \______________________ any error _______________________/          |
//!                                    v                                       v
//!                              Disconnected <------- session over / error ----
//! ```

use crate::connection::{ConnectionError, Transport};
use common::{
    ChatLine, ClientMessage, Departure, JoinRequest, Move, MoveError, ServerMessage, SessionError,
    SessionPhase, StateUpdate, Symbol, validate_move,
};
use std::collections::VecDeque;

/// The different phases we may be in concerning the connection.
#[derive(Clone, PartialEq, Debug)]
pub enum ConnectionState {
    /// When we are disconnected we may have an error string, that tells the reason why we went
    /// to disconnection. `None` means the session ended orderly.
    Disconnected { error_string: Option<String> },
    /// The join request still has to be sent.
    AwaitingHandshake,
    /// We are awaiting the server response with room and symbol.
    ExecutingHandshake,
    /// We are seated in a session.
    Connected { room_id: String, symbol: Symbol },
}

/// What the front end gets to see.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    /// The authoritative state, to be rendered as is.
    State(StateUpdate),
    /// The server refused our last request.
    Rejected(SessionError),
    Chat(ChatLine),
    /// The other player got lost while the game was running. The session is over.
    OpponentLeft(Departure),
    /// The session is over without a regular result, with a text for the user.
    SessionAborted(String),
}

/// The core entry point to the networking of the client.
pub struct GameClient<T: Transport> {
    /// The core connection, dropped once disconnected.
    transport: Option<T>,
    /// The join request sent as the first frame.
    join_request: JoinRequest,
    /// The current state we have.
    connection_state: ConnectionState,
    /// Events waiting to be polled by the front end.
    events: VecDeque<ClientEvent>,
    /// Messages waiting for the next heartbeat.
    outgoing: VecDeque<ClientMessage>,
    /// The latest state received, used for local pre-checks of moves.
    last_state: Option<StateUpdate>,
}

impl<T: Transport> GameClient<T> {
    /// Creates the client on top of a freshly connected transport.
    pub fn new(transport: T, join_request: JoinRequest) -> Self {
        GameClient {
            transport: Some(transport),
            join_request,
            connection_state: ConnectionState::AwaitingHandshake,
            events: VecDeque::new(),
            outgoing: VecDeque::new(),
            last_state: None,
        }
    }

    /// The update should be called once a heartbeat, before polling events.
    pub fn update(&mut self) {
        match self.connection_state {
            ConnectionState::Disconnected { .. } => {} // Nothing to do here.
            ConnectionState::AwaitingHandshake => self.send_join_request(),
            ConnectionState::ExecutingHandshake => self.update_handshake(),
            ConnectionState::Connected { .. } => self.update_connected(),
        }
    }

    /// The current connection state.
    pub fn connection_state(&self) -> &ConnectionState {
        &self.connection_state
    }

    /// Gets the next event for the front end, if any.
    pub fn next_event(&mut self) -> Option<ClientEvent> {
        self.events.pop_front()
    }

    /// Our symbol, once seated.
    pub fn symbol(&self) -> Option<Symbol> {
        match &self.connection_state {
            ConnectionState::Connected { symbol, .. } => Some(*symbol),
            _ => None,
        }
    }

    /// True if the game runs and the next move is ours.
    pub fn is_my_turn(&self) -> bool {
        match (&self.last_state, self.symbol()) {
            (Some(state), Some(symbol)) => {
                state.phase == SessionPhase::InProgress && state.turn == symbol
            }
            _ => false,
        }
    }

    /// Queues a move. Obviously illegal moves are refused locally to spare the round trip;
    /// the server stays the authority on everything else.
    pub fn place_mark(&mut self, row: u8, column: u8) -> Result<(), SessionError> {
        let (Some(state), Some(symbol)) = (&self.last_state, self.symbol()) else {
            return Err(SessionError::WaitingForOpponent);
        };
        match state.phase {
            SessionPhase::WaitingForPlayers => return Err(SessionError::WaitingForOpponent),
            SessionPhase::Terminal => return Err(SessionError::GameOver),
            SessionPhase::InProgress => {}
        }
        let mv = Move::new(symbol, row, column);
        if state.turn != symbol {
            return Err(MoveError::WrongTurn {
                expected: state.turn,
            }
            .into());
        }
        validate_move(&state.board, state.turn, &mv)?;
        self.outgoing.push_back(ClientMessage::PlaceMark(mv));
        Ok(())
    }

    pub fn send_chat(&mut self, text: String) {
        self.outgoing.push_back(ClientMessage::Chat(text));
    }

    /// Tells the server we have seen the result, then drops the connection.
    pub fn acknowledge(&mut self) {
        self.finish(ClientMessage::Acknowledge, None);
    }

    /// Leaves the session on purpose and drops the connection.
    pub fn leave(&mut self) {
        self.finish(
            ClientMessage::Leave,
            Some("Left the session.".to_string()),
        );
    }

    fn finish(&mut self, message: ClientMessage, error_string: Option<String>) {
        if matches!(self.connection_state, ConnectionState::Connected { .. }) {
            self.outgoing.push_back(message);
            self.flush_outgoing();
        }
        if let Some(transport) = self.transport.as_mut() {
            transport.close();
        }
        self.transport = None;
        self.connection_state = ConnectionState::Disconnected { error_string };
    }

    /// Global function to mark an error and drop the connection.
    fn mark_error(&mut self, error: ConnectionError) {
        tracing::warn!(%error, "Dropping connection.");
        self.connection_state = ConnectionState::Disconnected {
            error_string: Some(error.to_string()),
        };
        self.transport = None; // Drops sender + receiver, closes connection
    }

    fn send_join_request(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            debug_assert!(false, "No connection in awaiting handshake state");
            return;
        };
        match postcard::to_stdvec(&self.join_request) {
            Ok(frame) => {
                transport.send_frame(&frame);
                self.connection_state = ConnectionState::ExecutingHandshake;
            }
            Err(e) => self.mark_error(ConnectionError::Transport {
                reason: format!("could not encode join request: {}", e),
            }),
        }
    }

    /// We are just waiting for the response with room and symbol.
    fn update_handshake(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            debug_assert!(false, "No connection in executing handshake state");
            return;
        };
        let frame = match transport.try_recv_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(e) => return self.mark_error(e),
        };
        match ServerMessage::decode(&frame) {
            Ok(ServerMessage::Handshake(handshake)) => {
                tracing::info!(room_id = %handshake.room_id, symbol = %handshake.symbol, "Joined session.");
                self.connection_state = ConnectionState::Connected {
                    room_id: handshake.room_id,
                    symbol: handshake.symbol,
                };
                // State updates may already be waiting behind the handshake.
                self.update_connected();
            }
            Ok(ServerMessage::Error(text)) => self.mark_error(ConnectionError::Server { text }),
            Ok(other) => self.mark_error(ConnectionError::Transport {
                reason: format!("unexpected message {} during handshake", other.id()),
            }),
            Err(e) => self.mark_error(ConnectionError::Protocol(e)),
        }
    }

    fn update_connected(&mut self) {
        self.flush_outgoing();
        loop {
            let Some(transport) = self.transport.as_mut() else {
                return;
            };
            let frame = match transport.try_recv_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return,
                Err(e) => return self.mark_error(e),
            };
            match ServerMessage::decode(&frame) {
                Ok(message) => self.process(message),
                Err(e) => return self.mark_error(ConnectionError::Protocol(e)),
            }
        }
    }

    fn process(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::State(state) => {
                self.last_state = Some(state.clone());
                self.events.push_back(ClientEvent::State(state));
            }
            ServerMessage::Rejected(error) => self.events.push_back(ClientEvent::Rejected(error)),
            ServerMessage::Chat(line) => self.events.push_back(ClientEvent::Chat(line)),
            ServerMessage::OpponentLeft(departure) => {
                self.disconnect(Some(departure.to_string()));
                self.events.push_back(ClientEvent::OpponentLeft(departure));
            }
            ServerMessage::TimedOut => {
                let reason = "The session timed out.".to_string();
                self.disconnect(Some(reason.clone()));
                self.events.push_back(ClientEvent::SessionAborted(reason));
            }
            ServerMessage::Closed => self.disconnect(None),
            ServerMessage::Error(text) => self.mark_error(ConnectionError::Server { text }),
            ServerMessage::Handshake(_) => self.mark_error(ConnectionError::Transport {
                reason: "unexpected second handshake".to_string(),
            }),
        }
    }

    /// The server ended the session, the connection goes with it.
    fn disconnect(&mut self, error_string: Option<String>) {
        self.transport = None;
        self.connection_state = ConnectionState::Disconnected { error_string };
    }

    fn flush_outgoing(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        while let Some(message) = self.outgoing.pop_front() {
            match message.encode() {
                Ok(frame) => transport.send_frame(&frame),
                Err(error) => tracing::error!(%error, "Could not encode message."),
            }
        }
    }
}
