//! The HTTP side of the server: the WebSocket endpoint players connect to and the plain text
//! pages for rooms, statistics and config reloading.

use crate::hand_shake::{
    DisconnectData, inform_client_of_connection, init_and_connect, shutdown_connection,
};
use crate::lobby::{AppState, reload_config};
use crate::message_relay::handle_player_logic;
use axum::Router;
use axum::extract::ws::WebSocket;
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures_util::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Sets up the routing system to serve the web sockets and the pages enlist, stats and reload.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/reload", get(reload_handler))
        .route("/enlist", get(enlist_handler))
        .route("/stats", get(stats_handler))
        .route("/stats/{player}", get(player_stats_handler))
        .route("/ws", get(websocket_handler))
        .with_state(app_state)
}

/// Generates a list with the current rooms, their phase and who is seated.
async fn enlist_handler(State(state): State<Arc<AppState>>) -> String {
    let rooms = state.rooms.lock().await;
    if rooms.is_empty() {
        return "No active rooms.".to_string();
    }
    rooms
        .iter()
        .map(|(name, room)| {
            let status = room.status.borrow();
            format!(
                "Room: {:<30}  Phase: {:<18} X: {:<20} O: {:<20} is alive: {}",
                name,
                format!("{:?}", status.phase),
                status.player_x.as_deref().unwrap_or("-"),
                status.player_o.as_deref().unwrap_or("-"),
                room.is_alive()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Lists the win, loss and draw counts of every player that finished a game.
async fn stats_handler(State(state): State<Arc<AppState>>) -> String {
    let stats = state.stats.lock().await;
    if stats.is_empty() {
        return "No games recorded yet.".to_string();
    }
    stats
        .iter()
        .map(|(name, stats)| format!("Player: {:<32} {}", name, stats))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The counts of a single player. Unknown players simply have no games yet.
async fn player_stats_handler(
    State(state): State<Arc<AppState>>,
    Path(player): Path<String>,
) -> String {
    let stats = state.stats.lock().await;
    format!(
        "Player: {} {}",
        player,
        stats.get(&player).copied().unwrap_or_default()
    )
}

/// Forces the reload of the config file and lists the content. Changed limits and timeouts
/// apply to rooms opened afterwards, the bind address only on restart.
async fn reload_handler(State(state): State<Arc<AppState>>) -> String {
    match reload_config(&state).await {
        Ok(_) => {
            let config = state.config.read().await;
            format!(
                "Idle timeout: {} s\nWatchdog interval: {} s\nMaximum amount of rooms: {}",
                config.idle_timeout_secs, config.watchdog_interval_secs, config.max_rooms
            )
        }
        Err(e) => {
            format!("Config reload failed: {}", e)
        }
    }
}

/// This function gets immediately called and upgrades the web response to a web socket.
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| websocket(socket, state))
}

/// Does the whole handling from start to finish: Handshake -> Relaying between the player and
/// its session -> Shut down processing.
async fn websocket(stream: WebSocket, state: Arc<AppState>) {
    // By splitting, we can send and receive at the same time.
    let (mut sender, mut receiver) = stream.split();

    let Some(base_data) = init_and_connect(&mut sender, &mut receiver, state).await else {
        // We quit here, as the handshake did not work out.
        return;
    };

    let disconnect_data = DisconnectData::from(&base_data);
    let success = inform_client_of_connection(&mut sender, &base_data).await;
    let wrapped_sender = Arc::new(Mutex::new(sender));
    let outcome = if success {
        handle_player_logic(
            wrapped_sender.clone(),
            receiver,
            base_data.from_session,
            base_data.to_session,
            base_data.seat,
        )
        .await
    } else {
        tracing::warn!(player = %base_data.player_name, "Could not deliver the handshake response.");
        Ok("Connection to player lost")
    };

    shutdown_connection(wrapped_sender, disconnect_data, outcome).await;
}
