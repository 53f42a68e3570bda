use chrono::Utc;
use tracing::{error, info, warn};

use crate::models::{Comment, CommentReceivedMessage, SendMessage};
use crate::websocket::gateway::Audience;

use super::error::{Result, RoomError};
use super::RoomRegistry;

/// A comment as submitted, before it gets an id and timestamp
#[derive(Debug, Clone)]
pub struct CommentDraft {
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub video_position_seconds: f64,
    pub reply_to_id: Option<String>,
}

impl RoomRegistry {
    /// Persist a comment, then deliver it to every member of the room,
    /// author included. Nothing is broadcast if the write fails.
    ///
    /// The author must still be a member. The write and the broadcast happen
    /// under the room lock, so live order matches stored creation order.
    pub async fn send_comment(&self, room_id: &str, draft: CommentDraft) -> Result<Comment> {
        self.validate_comment(&draft)?;
        let room = self
            .lock_existing(room_id)
            .await
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
        if room.member(&draft.author_id).is_none() {
            return Err(RoomError::NotMember(room_id.to_string()));
        }
        let comment = self.post_comment(room_id, draft).await?;
        drop(room);
        Ok(comment)
    }

    /// Comment on behalf of whichever member the connection is bound to
    pub async fn send_comment_from(
        &self,
        connection_id: &str,
        text: String,
        position: f64,
        reply_to_id: Option<String>,
    ) -> Result<Comment> {
        let binding = self
            .gateway
            .binding(connection_id)
            .ok_or(RoomError::NotJoined)?;

        let room = self
            .lock_existing(&binding.room_id)
            .await
            .ok_or_else(|| RoomError::NotFound(binding.room_id.clone()))?;
        let author_name = room
            .member_by_connection(connection_id)
            .map(|m| m.display_name.clone())
            .ok_or_else(|| RoomError::NotMember(binding.room_id.clone()))?;

        let draft = CommentDraft {
            author_id: binding.user_id,
            author_name,
            text,
            video_position_seconds: position,
            reply_to_id,
        };
        self.validate_comment(&draft)?;
        let comment = self.post_comment(&binding.room_id, draft).await?;
        drop(room);
        Ok(comment)
    }

    fn validate_comment(&self, draft: &CommentDraft) -> Result<()> {
        let text = draft.text.trim();
        if text.is_empty() {
            return Err(RoomError::Validation("comment text is empty".to_string()));
        }
        let length = text.chars().count();
        if length > self.settings.comment_max_length {
            return Err(RoomError::Validation(format!(
                "comment is {} characters, limit is {}",
                length, self.settings.comment_max_length
            )));
        }
        if !draft.video_position_seconds.is_finite() || draft.video_position_seconds < 0.0 {
            return Err(RoomError::Validation(format!(
                "invalid position: {}",
                draft.video_position_seconds
            )));
        }
        Ok(())
    }

    /// Store and broadcast a validated comment. Caller holds the room guard.
    async fn post_comment(&self, room_id: &str, draft: CommentDraft) -> Result<Comment> {
        let comment = Comment {
            id: nanoid::nanoid!(),
            room_id: room_id.to_string(),
            author_id: draft.author_id,
            author_name: draft.author_name,
            text: draft.text.trim().to_string(),
            video_position_seconds: draft.video_position_seconds,
            reply_to_id: draft.reply_to_id.filter(|id| !id.trim().is_empty()),
            created_at: Utc::now().timestamp_millis(),
        };

        if let Err(e) = self.store.create_comment(&comment).await {
            error!("Failed to store comment in room {}: {}", room_id, e);
            return Err(e.into());
        }

        self.gateway.broadcast(
            room_id,
            SendMessage::CommentReceived(CommentReceivedMessage { comment: comment.clone() }),
            Audience::Everyone,
        );

        info!("Comment {} by {} in room {} at {}s", comment.id, comment.author_name, room_id, comment.video_position_seconds);
        Ok(comment)
    }

    /// Recent comments of a room in ascending creation order.
    /// A failing store yields an empty history rather than a failed join.
    pub async fn comment_history(&self, room_id: &str) -> Vec<Comment> {
        match self
            .store
            .list_comments_by_room(room_id, self.settings.comment_history_limit)
            .await
        {
            Ok(mut comments) => {
                comments.reverse();
                comments.sort_by_key(|c| c.created_at);
                comments
            }
            Err(e) => {
                warn!("Failed to load comment history for room {}: {}", room_id, e);
                Vec::new()
            }
        }
    }
}
