//! This module holds the rooms players meet in and the global server state.
//! It provides:
//! - [`RoomHandle`]: The channel ends through which connections reach a session task
//! - [`AppState`]: Global state holding all rooms, the player statistics and the configuration
//! - [`reload_config`]: Hot-reloading of the server settings

use crate::config::{ConfigError, ServerConfig, load_or_default};
use crate::session_task::{
    Outbound, RoomStatus, SessionChannels, SessionEvent, SessionOutcome, run_session,
};
use common::{CHANNEL_BUFFER_SIZE, GameResult, SessionPhase, Symbol};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, watch};

/// Win, loss and draw counts of one player, kept in memory for the lifetime of the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl fmt::Display for PlayerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wins: {}, Losses: {}, Draws: {}",
            self.wins, self.losses, self.draws
        )
    }
}

/// The description of a room players meet in.
#[derive(Clone)]
pub struct RoomHandle {
    /// The name of the room as stored in the map.
    pub room_id: String,
    /// Distinguishes sessions that reused the same room name.
    pub session_id: u64,
    /// The sender to reach the session task.
    pub to_session_sender: mpsc::Sender<SessionEvent>, // Clone-able no Mutex!
    /// The broadcast sender needed to subscribe for the players.
    pub session_broadcaster: broadcast::Sender<Outbound>, // Clone-able -> no Mutex!
    /// The latest status published by the session task.
    pub status: watch::Receiver<RoomStatus>,
}

impl RoomHandle {
    /// False once the session task has ended.
    pub fn is_alive(&self) -> bool {
        !self.to_session_sender.is_closed()
    }

    fn is_waiting(&self) -> bool {
        self.is_alive() && self.status.borrow().phase == SessionPhase::WaitingForPlayers
    }
}

/// The application state.
pub struct AppState {
    /// The rooms by name.
    pub rooms: Mutex<HashMap<String, RoomHandle>>,
    /// Statistics by player name.
    pub stats: Mutex<BTreeMap<String, PlayerStats>>,
    /// The current settings.
    pub config: RwLock<ServerConfig>,
    /// Where the settings get reloaded from.
    pub config_path: PathBuf,
    /// Counter for session ids and generated room names.
    next_session_id: Mutex<u64>,
}

impl AppState {
    pub fn new(config: ServerConfig, config_path: PathBuf) -> AppState {
        AppState {
            rooms: Mutex::new(HashMap::new()),
            stats: Mutex::new(BTreeMap::new()),
            config: RwLock::new(config),
            config_path,
            next_session_id: Mutex::new(1),
        }
    }

    /// Finds the room a join request leads to, creating it when necessary.
    ///
    /// An empty `requested_room` picks any room still waiting for a second player, except the
    /// ones in `tried`, and otherwise opens one with a generated name. A dead room under the
    /// requested name gets replaced. Whether the player really gets a seat is decided by the
    /// session task.
    pub async fn find_or_create_room(
        self: &Arc<Self>,
        requested_room: &str,
        tried: &[String],
    ) -> Result<RoomHandle, String> {
        let mut rooms = self.rooms.lock().await;

        if requested_room.is_empty() {
            if let Some(room) = rooms
                .values()
                .find(|room| room.is_waiting() && !tried.contains(&room.room_id))
            {
                return Ok(room.clone());
            }
        } else if let Some(room) = rooms.get(requested_room) {
            if room.is_alive() {
                return Ok(room.clone());
            }
            tracing::info!(room_id = %requested_room, "Replacing dead room.");
            rooms.remove(requested_room);
        }

        let max_rooms = self.config.read().await.max_rooms;
        if rooms.len() >= max_rooms {
            tracing::warn!(max_rooms, "Refusing to open another room.");
            return Err(format!("The server already hosts {} rooms.", max_rooms));
        }

        let mut session_id = self.next_session_id().await;
        let room_id = if requested_room.is_empty() {
            // Players may have picked a generated looking name themselves.
            while rooms.contains_key(&format!("room-{}", session_id)) {
                session_id = self.next_session_id().await;
            }
            format!("room-{}", session_id)
        } else {
            requested_room.to_string()
        };
        let room = self.spawn_session(room_id.clone(), session_id).await;
        rooms.insert(room_id, room.clone());
        Ok(room)
    }

    async fn next_session_id(&self) -> u64 {
        let mut next = self.next_session_id.lock().await;
        let id = *next;
        *next += 1;
        id
    }

    /// Creates the channels of a new session and starts its task. When the task ends, the
    /// statistics get updated and the room is removed.
    async fn spawn_session(self: &Arc<Self>, room_id: String, session_id: u64) -> RoomHandle {
        let (to_session_sender, events) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let (session_broadcaster, _) = broadcast::channel(CHANNEL_BUFFER_SIZE);
        let (status_sender, status) = watch::channel(RoomStatus::default());
        let idle_timeout = self.config.read().await.idle_timeout();

        let channels = SessionChannels {
            events,
            broadcaster: session_broadcaster.clone(),
            status: status_sender,
        };
        let state = self.clone();
        let task_room_id = room_id.clone();
        tokio::spawn(async move {
            let outcome = run_session(task_room_id.clone(), channels, idle_timeout).await;
            state.finish_session(&task_room_id, session_id, outcome).await;
        });
        tracing::info!(%room_id, session_id, "Opened room.");

        RoomHandle {
            room_id,
            session_id,
            to_session_sender,
            session_broadcaster,
            status,
        }
    }

    /// Books the result of an ended session and removes its room.
    pub async fn finish_session(&self, room_id: &str, session_id: u64, outcome: SessionOutcome) {
        self.record_result(&outcome).await;

        let mut rooms = self.rooms.lock().await;
        if rooms
            .get(room_id)
            .is_some_and(|room| room.session_id == session_id)
        {
            rooms.remove(room_id);
            tracing::info!(%room_id, "Closed room.");
        }
    }

    /// Updates the statistics of both players for a finished game.
    pub async fn record_result(&self, outcome: &SessionOutcome) {
        let (Some(player_x), Some(player_o)) = (&outcome.player_x, &outcome.player_o) else {
            return;
        };
        if !outcome.result.is_terminal() {
            return;
        }
        let mut stats = self.stats.lock().await;
        match outcome.result.winner() {
            Some(winner) => {
                let (winner_name, loser_name) = match winner {
                    Symbol::X => (player_x, player_o),
                    Symbol::O => (player_o, player_x),
                };
                stats.entry(winner_name.clone()).or_default().wins += 1;
                stats.entry(loser_name.clone()).or_default().losses += 1;
            }
            None => {
                debug_assert_eq!(outcome.result, GameResult::Draw);
                stats.entry(player_x.clone()).or_default().draws += 1;
                stats.entry(player_o.clone()).or_default().draws += 1;
            }
        }
    }
}

/// Runs over all rooms and drops the ones whose session task is gone.
/// This is a fallback, rooms are normally removed by their session task.
pub async fn cleanup_dead_rooms(state: &Arc<AppState>) {
    let mut rooms = state.rooms.lock().await;
    rooms.retain(|room_id, room| {
        let is_alive = room.is_alive();
        if !is_alive {
            tracing::info!("Removing dead room: {}", room_id);
        }
        is_alive
    });
}

/// Re-reads the configuration file. New values apply to rooms opened afterwards.
pub async fn reload_config(state: &Arc<AppState>) -> Result<(), ConfigError> {
    let new_config = load_or_default(&state.config_path).await?;
    {
        let mut config = state.config.write().await;
        *config = new_config; // Replace all.
    }
    Ok(())
}
