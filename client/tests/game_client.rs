//! Runs the game client against an in-memory transport that plays the server side.

use client::connection::{ConnectionError, Transport};
use client::game_client::{ClientEvent, ConnectionState, GameClient};
use common::{
    Board, ChatLine, ClientMessage, Departure, GameResult, Handshake, JoinRequest, Move, MoveError,
    ServerMessage, SessionError, SessionPhase, StateUpdate, Symbol,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Default)]
struct Wire {
    sent: Vec<Vec<u8>>,
    incoming: VecDeque<Result<Vec<u8>, ConnectionError>>,
    closed: bool,
}

#[derive(Clone, Default)]
struct MockTransport(Rc<RefCell<Wire>>);

impl Transport for MockTransport {
    fn send_frame(&mut self, frame: &[u8]) {
        self.0.borrow_mut().sent.push(frame.to_vec());
    }

    fn try_recv_frame(&mut self) -> Result<Option<Vec<u8>>, ConnectionError> {
        self.0.borrow_mut().incoming.pop_front().transpose()
    }

    fn close(&mut self) {
        self.0.borrow_mut().closed = true;
    }
}

impl MockTransport {
    fn push(&self, message: ServerMessage) {
        let frame = message.encode().unwrap().to_vec();
        self.0.borrow_mut().incoming.push_back(Ok(frame));
    }

    fn push_error(&self, error: ConnectionError) {
        self.0.borrow_mut().incoming.push_back(Err(error));
    }

    /// Everything sent after the join request, decoded.
    fn sent_messages(&self) -> Vec<ClientMessage> {
        self.0.borrow().sent[1..]
            .iter()
            .map(|frame| ClientMessage::decode(frame).unwrap())
            .collect()
    }
}

fn running_state(board: Board, turn: Symbol) -> StateUpdate {
    StateUpdate {
        board,
        turn,
        result: GameResult::InProgress,
        phase: SessionPhase::InProgress,
        player_x: Some("alice".into()),
        player_o: Some("bob".into()),
        last_move: None,
    }
}

/// A client seated as `symbol` that already received the given state.
fn seated_client(symbol: Symbol, state: StateUpdate) -> (GameClient<MockTransport>, MockTransport) {
    let wire = MockTransport::default();
    let mut client = GameClient::new(
        wire.clone(),
        JoinRequest {
            player_name: "alice".into(),
            room_id: String::new(),
        },
    );
    client.update();
    wire.push(ServerMessage::Handshake(Handshake {
        room_id: "room-1".into(),
        symbol,
    }));
    wire.push(ServerMessage::State(state.clone()));
    client.update();
    assert_eq!(client.next_event(), Some(ClientEvent::State(state)));
    (client, wire)
}

#[test]
fn handshake_sends_the_join_request_first() {
    let wire = MockTransport::default();
    let mut client = GameClient::new(
        wire.clone(),
        JoinRequest {
            player_name: "alice".into(),
            room_id: "lounge".into(),
        },
    );
    assert_eq!(client.connection_state(), &ConnectionState::AwaitingHandshake);

    client.update();
    assert_eq!(client.connection_state(), &ConnectionState::ExecutingHandshake);
    let sent = wire.0.borrow().sent.clone();
    assert_eq!(sent.len(), 1);
    let request: JoinRequest = postcard::from_bytes(&sent[0]).unwrap();
    assert_eq!(request.room_id, "lounge");

    // Nothing arrived yet.
    client.update();
    assert_eq!(client.connection_state(), &ConnectionState::ExecutingHandshake);

    wire.push(ServerMessage::Handshake(Handshake {
        room_id: "lounge".into(),
        symbol: Symbol::O,
    }));
    client.update();
    assert_eq!(
        client.connection_state(),
        &ConnectionState::Connected {
            room_id: "lounge".into(),
            symbol: Symbol::O
        }
    );
    assert_eq!(client.symbol(), Some(Symbol::O));
    assert_eq!(client.next_event(), None);
}

#[test]
fn server_error_during_handshake_disconnects() {
    let wire = MockTransport::default();
    let mut client = GameClient::new(
        wire.clone(),
        JoinRequest {
            player_name: "carol".into(),
            room_id: "lounge".into(),
        },
    );
    client.update();
    wire.push(ServerMessage::Error("Room lounge is full.".into()));
    client.update();
    assert_eq!(
        client.connection_state(),
        &ConnectionState::Disconnected {
            error_string: Some("Room lounge is full.".into())
        }
    );
}

#[test]
fn local_checks_keep_bad_moves_off_the_wire() {
    let board = Board::from_rows(["X  ", "   ", "   "]).unwrap();
    let (mut client, wire) = seated_client(Symbol::O, running_state(board, Symbol::O));
    assert!(client.is_my_turn());

    assert_eq!(
        client.place_mark(0, 0),
        Err(SessionError::InvalidMove(MoveError::CellOccupied { row: 0, column: 0 }))
    );
    assert_eq!(
        client.place_mark(1, 3),
        Err(SessionError::InvalidMove(MoveError::OutOfBounds { row: 1, column: 3 }))
    );
    assert_eq!(client.place_mark(1, 1), Ok(()));
    client.send_chat("hi".into());
    client.update();
    assert_eq!(
        wire.sent_messages(),
        vec![
            ClientMessage::PlaceMark(Move::new(Symbol::O, 1, 1)),
            ClientMessage::Chat("hi".into())
        ]
    );
}

#[test]
fn moving_out_of_turn_is_refused() {
    let (mut client, wire) = seated_client(Symbol::O, running_state(Board::new(), Symbol::X));
    assert!(!client.is_my_turn());
    assert_eq!(
        client.place_mark(1, 1),
        Err(SessionError::InvalidMove(MoveError::WrongTurn { expected: Symbol::X }))
    );
    client.update();
    assert!(wire.sent_messages().is_empty());
}

#[test]
fn events_arrive_in_order() {
    let (mut client, wire) = seated_client(Symbol::X, running_state(Board::new(), Symbol::X));
    wire.push(ServerMessage::Rejected(SessionError::GameOver));
    wire.push(ServerMessage::Chat(ChatLine {
        from: "bob".into(),
        text: "good luck".into(),
    }));
    client.update();
    assert_eq!(
        client.next_event(),
        Some(ClientEvent::Rejected(SessionError::GameOver))
    );
    assert!(matches!(client.next_event(), Some(ClientEvent::Chat(line)) if line.from == "bob"));
    assert_eq!(client.next_event(), None);
}

#[test]
fn acknowledging_a_result_ends_orderly() {
    let mut finished = running_state(Board::from_rows(["XXX", "OO ", "   "]).unwrap(), Symbol::O);
    finished.result = GameResult::XWins;
    finished.phase = SessionPhase::Terminal;
    let (mut client, wire) = seated_client(Symbol::X, finished);
    assert_eq!(client.place_mark(2, 2), Err(SessionError::GameOver));

    client.acknowledge();
    assert_eq!(wire.sent_messages(), vec![ClientMessage::Acknowledge]);
    assert!(wire.0.borrow().closed);
    assert_eq!(
        client.connection_state(),
        &ConnectionState::Disconnected { error_string: None }
    );
}

#[test]
fn opponent_loss_aborts_the_session() {
    let (mut client, wire) = seated_client(Symbol::X, running_state(Board::new(), Symbol::X));
    let departure = Departure {
        error: SessionError::ConnectionLost,
        reason: "Connection lost.".into(),
    };
    wire.push(ServerMessage::OpponentLeft(departure.clone()));
    client.update();
    assert_eq!(client.next_event(), Some(ClientEvent::OpponentLeft(departure)));
    assert!(matches!(
        client.connection_state(),
        ConnectionState::Disconnected { error_string: Some(_) }
    ));
}

#[test]
fn transport_failure_and_garbage_disconnect() {
    let (mut client, wire) = seated_client(Symbol::X, running_state(Board::new(), Symbol::X));
    wire.push_error(ConnectionError::Closed);
    client.update();
    assert_eq!(
        client.connection_state(),
        &ConnectionState::Disconnected {
            error_string: Some("connection closed by server".into())
        }
    );

    let (mut client, wire) = seated_client(Symbol::X, running_state(Board::new(), Symbol::X));
    wire.0.borrow_mut().incoming.push_back(Ok(vec![42]));
    client.update();
    assert!(matches!(
        client.connection_state(),
        ConnectionState::Disconnected { error_string: Some(_) }
    ));
}

#[test]
fn idle_timeout_is_reported_once() {
    let (mut client, wire) = seated_client(Symbol::O, running_state(Board::new(), Symbol::X));
    wire.push(ServerMessage::TimedOut);
    client.update();
    assert_eq!(
        client.next_event(),
        Some(ClientEvent::SessionAborted("The session timed out.".into()))
    );
    assert_eq!(client.next_event(), None);
    assert!(!client.is_my_turn());
}
