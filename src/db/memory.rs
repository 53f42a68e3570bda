use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::db::store::{RoomStore, StoreError};
use crate::models::{Comment, RoomRow};

/// In-process room store.
///
/// Used when no database is configured and in tests. Writes can be made to
/// fail on demand to exercise the durability paths.
#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: RwLock<HashMap<String, RoomRow>>,
    comments: RwLock<Vec<Comment>>,
    fail_writes: AtomicBool,
    comment_delay_ms: AtomicU64,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write return `StoreError::Unavailable`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Stall every comment write, simulating a slow database
    pub fn set_comment_delay(&self, delay: Duration) {
        self.comment_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn comment_count(&self) -> usize {
        self.comments.read().len()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn create_room(&self, id: &str, name: &str) -> Result<RoomRow, StoreError> {
        self.check_writable()?;
        let row = RoomRow {
            id: id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
            video_url: None,
            video_position: 0.0,
            is_playing: false,
        };
        let mut rooms = self.rooms.write();
        if rooms.contains_key(id) {
            return Err(StoreError::Unavailable(format!("room {} already exists", id)));
        }
        rooms.insert(id.to_string(), row.clone());
        Ok(row)
    }

    async fn get_room(&self, id: &str) -> Result<Option<RoomRow>, StoreError> {
        Ok(self.rooms.read().get(id).cloned())
    }

    async fn list_rooms(&self, limit: i64) -> Result<Vec<RoomRow>, StoreError> {
        let mut rows: Vec<RoomRow> = self.rooms.read().values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn delete_room(&self, id: &str) -> Result<bool, StoreError> {
        self.check_writable()?;
        let removed = self.rooms.write().remove(id).is_some();
        if removed {
            self.comments.write().retain(|c| c.room_id != id);
        }
        Ok(removed)
    }

    async fn update_video_state(
        &self,
        id: &str,
        video_url: Option<&str>,
        position: f64,
        is_playing: bool,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        if let Some(row) = self.rooms.write().get_mut(id) {
            row.video_url = video_url.map(str::to_string);
            row.video_position = position;
            row.is_playing = is_playing;
        }
        Ok(())
    }

    async fn create_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        let delay = self.comment_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.check_writable()?;
        self.comments.write().push(comment.clone());
        Ok(())
    }

    async fn list_comments_by_room(&self, room_id: &str, limit: i64) -> Result<Vec<Comment>, StoreError> {
        let mut comments: Vec<Comment> = self
            .comments
            .read()
            .iter()
            .filter(|c| c.room_id == room_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps; reverse gives newest first
        comments.sort_by_key(|c| c.created_at);
        comments.reverse();
        comments.truncate(limit.max(0) as usize);
        Ok(comments)
    }

    async fn list_comments_by_video_window(
        &self,
        room_id: &str,
        start: f64,
        end: f64,
    ) -> Result<Vec<Comment>, StoreError> {
        let mut comments: Vec<Comment> = self
            .comments
            .read()
            .iter()
            .filter(|c| c.room_id == room_id && c.video_position_seconds >= start && c.video_position_seconds <= end)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.video_position_seconds.total_cmp(&b.video_position_seconds));
        Ok(comments)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
