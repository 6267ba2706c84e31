//! The tic-tac-toe session server.
//!
//! Players connect over a WebSocket, get paired into a session and play against each other
//! while the server keeps the authoritative board. The building blocks:
//!
//! - [`session`]: the pure state machine of one game
//! - [`session_task`]: the task that owns a session and serializes all events for it
//! - [`lobby`]: rooms, player statistics and the shared application state
//! - [`hand_shake`] and [`message_relay`]: the per connection protocol handling
//! - [`routes`]: the WebSocket endpoint and the plain text pages
//! - [`config`]: settings loaded from a JSON file

pub mod config;
pub mod hand_shake;
pub mod lobby;
pub mod message_relay;
pub mod routes;
pub mod session;
pub mod session_task;
