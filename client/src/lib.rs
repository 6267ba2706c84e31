//! Console client for the tic-tac-toe session server.
//!
//! [`connection`] moves raw frames, [`game_client`] keeps the connection state machine,
//! [`lobby_pages`] fetches the room list and statistics and [`console`] does the text in and
//! out.

pub mod connection;
pub mod console;
pub mod game_client;
pub mod lobby_pages;

/// The delay between two heartbeats of the console loop.
pub const HEARTBEAT: std::time::Duration = std::time::Duration::from_millis(50);
