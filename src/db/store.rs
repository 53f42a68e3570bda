use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Comment, RoomRow};

/// Default number of rooms returned by `list_rooms`
pub const DEFAULT_ROOM_LIST_LIMIT: i64 = 50;

/// Default number of comments returned by `list_comments_by_room`
pub const DEFAULT_COMMENT_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable room metadata and comment history.
///
/// The sync engine only reads room rows when a room is materialized, writes
/// playback state best-effort and writes comments before broadcasting them.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn create_room(&self, id: &str, name: &str) -> Result<RoomRow, StoreError>;

    async fn get_room(&self, id: &str) -> Result<Option<RoomRow>, StoreError>;

    /// Rooms ordered by creation time, newest first
    async fn list_rooms(&self, limit: i64) -> Result<Vec<RoomRow>, StoreError>;

    /// Removes the room and every comment attached to it
    async fn delete_room(&self, id: &str) -> Result<bool, StoreError>;

    /// No-op when the room has no stored row
    async fn update_video_state(
        &self,
        id: &str,
        video_url: Option<&str>,
        position: f64,
        is_playing: bool,
    ) -> Result<(), StoreError>;

    async fn create_comment(&self, comment: &Comment) -> Result<(), StoreError>;

    /// Most recent comments first
    async fn list_comments_by_room(&self, room_id: &str, limit: i64) -> Result<Vec<Comment>, StoreError>;

    /// Comments whose video position lies in `[start, end]`, ascending by position
    async fn list_comments_by_video_window(
        &self,
        room_id: &str,
        start: f64,
        end: f64,
    ) -> Result<Vec<Comment>, StoreError>;

    /// Cheap reachability probe for readiness checks
    async fn ping(&self) -> Result<(), StoreError>;

    fn backend_name(&self) -> &'static str;
}
