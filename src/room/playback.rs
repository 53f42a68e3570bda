use tracing::{debug, info};

use crate::models::{PlaybackMessage, PlaybackState, SendMessage, VideoSetMessage};
use crate::websocket::gateway::Audience;

use super::error::{Result, RoomError};
use super::RoomRegistry;

/// Host-only playback control
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackCommand {
    Play(f64),
    Pause(f64),
    Seek(f64),
}

impl PlaybackCommand {
    pub fn position(&self) -> f64 {
        match *self {
            PlaybackCommand::Play(p) | PlaybackCommand::Pause(p) | PlaybackCommand::Seek(p) => p,
        }
    }

    /// Seek leaves the play flag as it was
    pub fn apply(&self, state: &mut PlaybackState) {
        state.position_seconds = self.position();
        match self {
            PlaybackCommand::Play(_) => state.is_playing = true,
            PlaybackCommand::Pause(_) => state.is_playing = false,
            PlaybackCommand::Seek(_) => {}
        }
    }

    pub fn to_message(&self) -> SendMessage {
        let payload = PlaybackMessage { position: self.position() };
        match self {
            PlaybackCommand::Play(_) => SendMessage::Play(payload),
            PlaybackCommand::Pause(_) => SendMessage::Pause(payload),
            PlaybackCommand::Seek(_) => SendMessage::Seek(payload),
        }
    }

    fn validate(&self) -> Result<()> {
        let position = self.position();
        if !position.is_finite() || position < 0.0 {
            return Err(RoomError::Validation(format!("invalid position: {}", position)));
        }
        Ok(())
    }
}

impl RoomRegistry {
    /// Load a new video. Any member may do this; position and play flag reset.
    pub async fn set_video(&self, room_id: &str, connection_id: &str, url: &str) -> Result<PlaybackState> {
        let url = url.trim();
        if url.is_empty() {
            return Err(RoomError::Validation("url is required".to_string()));
        }

        let mut room = self
            .lock_existing(room_id)
            .await
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
        if room.member_by_connection(connection_id).is_none() {
            return Err(RoomError::NotMember(room_id.to_string()));
        }

        room.playback.load_video(url.to_string());
        self.writer.submit(room_id, &room.playback);
        self.gateway.broadcast(
            room_id,
            SendMessage::VideoSet(VideoSetMessage { url: url.to_string() }),
            Audience::Everyone,
        );

        info!("Room {} switched video to {}", room_id, url);
        Ok(room.playback.clone())
    }

    /// Apply a playback command from the host and relay it to everyone else.
    ///
    /// Commands from anyone else are rejected with no state change and no
    /// broadcast.
    pub async fn control_playback(
        &self,
        room_id: &str,
        connection_id: &str,
        command: PlaybackCommand,
    ) -> Result<PlaybackState> {
        command.validate()?;

        let mut room = self
            .lock_existing(room_id)
            .await
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
        let Some(sender) = room.member_by_connection(connection_id) else {
            return Err(RoomError::NotMember(room_id.to_string()));
        };
        if !sender.is_host {
            debug!("Ignoring {:?} from non-host {} in room {}", command, sender.user_id, room_id);
            return Err(RoomError::NotHost);
        }

        command.apply(&mut room.playback);
        self.writer.submit(room_id, &room.playback);
        self.gateway.broadcast(room_id, command.to_message(), Audience::AllExcept(connection_id));

        Ok(room.playback.clone())
    }

    pub async fn play(&self, room_id: &str, connection_id: &str, position: f64) -> Result<PlaybackState> {
        self.control_playback(room_id, connection_id, PlaybackCommand::Play(position)).await
    }

    pub async fn pause(&self, room_id: &str, connection_id: &str, position: f64) -> Result<PlaybackState> {
        self.control_playback(room_id, connection_id, PlaybackCommand::Pause(position)).await
    }

    pub async fn seek(&self, room_id: &str, connection_id: &str, position: f64) -> Result<PlaybackState> {
        self.control_playback(room_id, connection_id, PlaybackCommand::Seek(position)).await
    }
}
