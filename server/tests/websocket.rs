//! Serves the real router on an ephemeral port and talks to it over WebSockets, the way the
//! console client does.

use client::connection::{ConnectionError, Transport, WebSocketTransport};
use client::lobby_pages::LobbyPages;
use common::{
    CHANNEL_BUFFER_SIZE, ClientMessage, Departure, JoinRequest, Move, ServerMessage,
    SessionError, SessionPhase, StateUpdate, Symbol,
};
use server::config::ServerConfig;
use server::lobby::{AppState, RoomHandle};
use server::routes::router;
use server::session_task::{RoomStatus, SessionChannels, SessionEvent, run_session};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

const PATIENCE: Duration = Duration::from_secs(5);

async fn start_server() -> (String, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        ServerConfig::default(),
        PathBuf::from("does/not/exist/ServerConfig.json"),
    ));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let app = router(state.clone());
    tokio::spawn(async move { axum::serve(listener, app).await });
    (address, state)
}

struct Player {
    transport: WebSocketTransport,
}

impl Player {
    fn connect(address: &str, name: &str, room: &str) -> Player {
        let mut transport = WebSocketTransport::connect(&format!("ws://{}/ws", address)).unwrap();
        let request = JoinRequest {
            player_name: name.into(),
            room_id: room.into(),
        };
        transport.send_frame(&postcard::to_stdvec(&request).unwrap());
        Player { transport }
    }

    fn send(&mut self, message: ClientMessage) {
        self.transport.send_frame(&message.encode().unwrap());
    }

    /// The next frame, or the error that ended the connection.
    async fn next(&mut self) -> Result<ServerMessage, ConnectionError> {
        tokio::time::timeout(PATIENCE, async {
            loop {
                if let Some(frame) = self.transport.try_recv_frame()? {
                    return Ok(ServerMessage::decode(&frame).unwrap());
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("no frame from the server in time")
    }

    async fn message(&mut self) -> ServerMessage {
        self.next().await.unwrap()
    }

    async fn state(&mut self) -> StateUpdate {
        match self.message().await {
            ServerMessage::State(state) => state,
            other => panic!("expected a state update, got {other:?}"),
        }
    }

    /// Reads the handshake and returns the room and the seat.
    async fn seated(&mut self) -> (String, Symbol) {
        match self.message().await {
            ServerMessage::Handshake(handshake) => (handshake.room_id, handshake.symbol),
            other => panic!("expected a handshake, got {other:?}"),
        }
    }

    /// Expects a `SERVER_ERROR` followed by the end of the connection.
    async fn turned_away(&mut self) -> String {
        let ServerMessage::Error(text) = self.message().await else {
            panic!("expected a server error");
        };
        assert!(self.next().await.is_err());
        text
    }
}

async fn wait_for_no_rooms(state: &AppState) {
    tokio::time::timeout(PATIENCE, async {
        while !state.rooms.lock().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("rooms were not cleaned up");
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_names_are_turned_away() {
    let (address, state) = start_server().await;

    let text = Player::connect(&address, "   ", "").turned_away().await;
    assert!(text.starts_with("Player names need"), "{text}");

    let text = Player::connect(&address, "alice", &"r".repeat(40)).turned_away().await;
    assert!(text.starts_with("Room names may have"), "{text}");

    assert!(state.rooms.lock().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn undecodable_frame_ends_the_connection() {
    let (address, state) = start_server().await;
    let mut alice = Player::connect(&address, "alice", "frames");
    assert_eq!(alice.seated().await, ("frames".to_string(), Symbol::X));
    assert_eq!(alice.state().await.phase, SessionPhase::WaitingForPlayers);

    alice.transport.send_frame(&[42]);
    // The room closing may race the error text, only the text matters here.
    let text = loop {
        match alice.message().await {
            ServerMessage::Closed => continue,
            ServerMessage::Error(text) => break text,
            other => panic!("expected a server error, got {other:?}"),
        }
    };
    assert_eq!(text, "Illegal message from client.");
    assert!(alice.next().await.is_err());
    wait_for_no_rooms(&state).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn leaving_mid_game_informs_the_opponent() {
    let (address, state) = start_server().await;
    let mut alice = Player::connect(&address, "alice", "duel");
    alice.seated().await;
    alice.state().await;
    let mut bob = Player::connect(&address, "bob", "duel");
    assert_eq!(bob.seated().await, ("duel".to_string(), Symbol::O));
    assert_eq!(bob.state().await.phase, SessionPhase::InProgress);

    alice.send(ClientMessage::Leave);
    assert_eq!(
        bob.message().await,
        ServerMessage::OpponentLeft(Departure {
            error: SessionError::ConnectionLost,
            reason: "Opponent left the session.".into(),
        })
    );
    assert!(bob.next().await.is_err());
    wait_for_no_rooms(&state).await;
    assert!(state.stats.lock().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn auto_match_moves_on_from_a_full_room() {
    let (address, state) = start_server().await;

    // A session that is full while its published status still says it waits, as it happens
    // when two players race for the last seat.
    let (to_session_sender, events) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let (session_broadcaster, _) = broadcast::channel(CHANNEL_BUFFER_SIZE);
    let (real_status, _real_status_receiver) = watch::channel(RoomStatus::default());
    let (_stale_status, status) = watch::channel(RoomStatus::default());
    tokio::spawn(run_session(
        "crowded".into(),
        SessionChannels {
            events,
            broadcaster: session_broadcaster.clone(),
            status: real_status,
        },
        PATIENCE,
    ));
    for name in ["carol", "dave"] {
        let (reply, answer) = oneshot::channel();
        to_session_sender
            .send(SessionEvent::Join {
                name: name.into(),
                reply,
            })
            .await
            .unwrap();
        answer.await.unwrap().unwrap();
    }
    state.rooms.lock().await.insert(
        "crowded".into(),
        RoomHandle {
            room_id: "crowded".into(),
            session_id: 1000,
            to_session_sender,
            session_broadcaster,
            status,
        },
    );

    let mut alice = Player::connect(&address, "alice", "");
    let (room_id, symbol) = alice.seated().await;
    assert_ne!(room_id, "crowded");
    assert_eq!(symbol, Symbol::X);
    assert_eq!(alice.state().await.phase, SessionPhase::WaitingForPlayers);
}

#[tokio::test(flavor = "multi_thread")]
async fn finished_game_shows_up_in_the_statistics() {
    let (address, state) = start_server().await;
    let mut alice = Player::connect(&address, "alice", "");
    let (room_id, _) = alice.seated().await;
    alice.state().await;
    let mut bob = Player::connect(&address, "bob", "");
    assert_eq!(bob.seated().await, (room_id, Symbol::O));
    bob.state().await;
    alice.state().await;

    for (seat, row, column) in [
        (Symbol::X, 0, 0),
        (Symbol::O, 1, 0),
        (Symbol::X, 0, 1),
        (Symbol::O, 1, 1),
        (Symbol::X, 0, 2),
    ] {
        let mover = if seat == Symbol::X { &mut alice } else { &mut bob };
        mover.send(ClientMessage::PlaceMark(Move::new(seat, row, column)));
        // Wait for the broadcast so the next move is sent on the new state.
        alice.state().await;
        bob.state().await;
    }

    alice.send(ClientMessage::PlaceMark(Move::new(Symbol::X, 2, 2)));
    assert_eq!(
        alice.message().await,
        ServerMessage::Rejected(SessionError::GameOver)
    );

    alice.send(ClientMessage::Acknowledge);
    bob.send(ClientMessage::Acknowledge);
    assert_eq!(alice.message().await, ServerMessage::Closed);
    assert_eq!(bob.message().await, ServerMessage::Closed);
    wait_for_no_rooms(&state).await;

    // The blocking HTTP client has to live outside the runtime threads.
    let (alice_stats, rooms) = tokio::task::spawn_blocking(move || {
        let pages = LobbyPages::new(&address).unwrap();
        (pages.player_stats("alice"), pages.rooms())
    })
    .await
    .unwrap();
    assert_eq!(
        alice_stats.unwrap(),
        "Player: alice Wins: 1, Losses: 0, Draws: 0"
    );
    assert_eq!(rooms.unwrap(), "No active rooms.");
    assert_eq!(state.stats.lock().await["bob"].losses, 1);
}
