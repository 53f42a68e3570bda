//! Room synchronization engine: registry, membership, playback and comments.
//!
//! Every operation on a room runs under that room's mutex, so membership
//! changes, playback commands and comment fan-out for one room are applied
//! and broadcast in a single total order.

pub mod error;
pub mod registry;
pub mod membership;
pub mod playback;
pub mod comments;

pub use error::RoomError;
pub use registry::{RoomRegistry, RoomSnapshot, RoomState};
pub use membership::{JoinOutcome, JoinRequest};
pub use playback::PlaybackCommand;
pub use comments::CommentDraft;

/// Tunables of the sync engine
#[derive(Debug, Clone, Copy)]
pub struct RoomSettings {
    pub comment_max_length: usize,
    pub comment_history_limit: i64,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            comment_max_length: 100,
            comment_history_limit: crate::db::DEFAULT_COMMENT_HISTORY_LIMIT,
        }
    }
}
