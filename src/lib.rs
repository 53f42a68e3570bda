//! Watch-party room synchronization server.
//!
//! Clients join rooms over a WebSocket at `/ws`; the room host drives shared
//! playback, any member may load a video, and timed comments are persisted and
//! fanned out to the whole room.

pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod room;
pub mod routes;
pub mod state;
pub mod websocket;

pub use config::Config;
pub use routes::build_router;
pub use state::AppState;
