use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Bandwidth above which (in kbps) a member may act as a relay node
pub const SUPER_NODE_MIN_BANDWIDTH: f64 = 5000.0;

/// Latency below which (in ms) a member may act as a relay node
pub const SUPER_NODE_MAX_LATENCY: f64 = 100.0;

/// Self-reported network quality sent along with a join
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    /// Declared bandwidth, kbps
    pub bandwidth: f64,
    /// Declared round-trip latency, ms
    pub latency: f64,
}

/// Role reserved for the peer relay extension
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NetworkRole {
    Normal,
    Super,
}

impl NetworkRole {
    pub fn classify(stats: Option<&NetworkStats>) -> Self {
        match stats {
            Some(s) if s.bandwidth > SUPER_NODE_MIN_BANDWIDTH && s.latency < SUPER_NODE_MAX_LATENCY => NetworkRole::Super,
            _ => NetworkRole::Normal,
        }
    }
}

/// Shared video state of a room
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub video_url: Option<String>,
    pub position_seconds: f64,
    pub is_playing: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            video_url: None,
            position_seconds: 0.0,
            is_playing: false,
        }
    }
}

impl PlaybackState {
    /// Switch to a new video. Position and play flag always reset.
    pub fn load_video(&mut self, url: String) {
        self.video_url = Some(url);
        self.position_seconds = 0.0;
        self.is_playing = false;
    }
}

impl From<&RoomRow> for PlaybackState {
    fn from(row: &RoomRow) -> Self {
        Self {
            video_url: row.video_url.clone(),
            position_seconds: row.video_position.max(0.0),
            is_playing: row.is_playing,
        }
    }
}

/// A user's presence in a room
#[derive(Debug, Clone)]
pub struct Member {
    pub user_id: String,
    pub display_name: String,
    pub connection_id: String,
    pub is_host: bool,
    pub role: NetworkRole,
    pub network_stats: Option<NetworkStats>,
    pub joined_at: DateTime<Utc>,
    /// Strictly increasing within a room; lowest remaining value inherits host
    pub join_seq: u64,
}

impl Member {
    pub fn summary(&self) -> MemberSummary {
        MemberSummary {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            is_host: self.is_host,
            role: self.role,
            connection_id: self.connection_id.clone(),
        }
    }
}

/// Member as seen by other clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    pub user_id: String,
    pub display_name: String,
    pub is_host: bool,
    pub role: NetworkRole,
    pub connection_id: String,
}

/// A timed comment overlaid on the video
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub room_id: String,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub video_position_seconds: f64,
    /// Not re-validated: the referenced comment may be gone
    pub reply_to_id: Option<String>,
    /// Server timestamp, milliseconds since the epoch
    pub created_at: i64,
}

/// Stored room metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoomRow {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub video_url: Option<String>,
    pub video_position: f64,
    pub is_playing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_classification() {
        let fast = NetworkStats { bandwidth: 6000.0, latency: 50.0 };
        let slow = NetworkStats { bandwidth: 1000.0, latency: 50.0 };
        let laggy = NetworkStats { bandwidth: 6000.0, latency: 150.0 };
        let edge = NetworkStats { bandwidth: 5000.0, latency: 99.0 };

        assert_eq!(NetworkRole::classify(Some(&fast)), NetworkRole::Super);
        assert_eq!(NetworkRole::classify(Some(&slow)), NetworkRole::Normal);
        assert_eq!(NetworkRole::classify(Some(&laggy)), NetworkRole::Normal);
        assert_eq!(NetworkRole::classify(Some(&edge)), NetworkRole::Normal);
        assert_eq!(NetworkRole::classify(None), NetworkRole::Normal);
    }

    #[test]
    fn test_load_video_resets_position() {
        let mut state = PlaybackState {
            video_url: Some("https://a.test/v.mp4".to_string()),
            position_seconds: 42.0,
            is_playing: true,
        };
        state.load_video("https://b.test/v.mp4".to_string());
        assert_eq!(state, PlaybackState {
            video_url: Some("https://b.test/v.mp4".to_string()),
            position_seconds: 0.0,
            is_playing: false,
        });
    }

    #[test]
    fn test_comment_wire_format() {
        let comment = Comment {
            id: "c1".to_string(),
            room_id: "r1".to_string(),
            author_id: "u1".to_string(),
            author_name: "Ann".to_string(),
            text: "hi".to_string(),
            video_position_seconds: 12.5,
            reply_to_id: None,
            created_at: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(json["videoPositionSeconds"], 12.5);
        assert_eq!(json["authorName"], "Ann");
        assert!(json["replyToId"].is_null());
    }
}
