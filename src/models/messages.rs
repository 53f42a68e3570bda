use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::models::{Comment, MemberSummary, NetworkRole, NetworkStats, PlaybackState};

// Inbound

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JoinMessage {
    pub room_id: String,
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub network_stats: Option<NetworkStats>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct LeaveMessage {}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SetVideoMessage {
    pub url: String,
}

/// Payload of play, pause and seek, in both directions
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackMessage {
    pub position: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SendCommentMessage {
    pub text: String,
    pub position: f64,
    #[serde(default)]
    pub reply_to_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignalMessage {
    pub to: String,
    pub signal: Value,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMessage {
    pub to: String,
    pub candidate: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PeerStateMessage {
    #[serde(default)]
    pub connected_peers: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FallbackRelayMessage {
    pub message: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PingMessage {}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ReceivedMessage {
    #[serde(rename = "join")]
    Join(JoinMessage),
    #[serde(rename = "leave")]
    Leave(LeaveMessage),
    #[serde(rename = "setVideo")]
    SetVideo(SetVideoMessage),
    #[serde(rename = "play")]
    Play(PlaybackMessage),
    #[serde(rename = "pause")]
    Pause(PlaybackMessage),
    #[serde(rename = "seek")]
    Seek(PlaybackMessage),
    #[serde(rename = "sendComment")]
    SendComment(SendCommentMessage),
    #[serde(rename = "signal")]
    Signal(SignalMessage),
    #[serde(rename = "candidate")]
    Candidate(CandidateMessage),
    #[serde(rename = "peerState")]
    PeerState(PeerStateMessage),
    #[serde(rename = "fallbackRelay")]
    FallbackRelay(FallbackRelayMessage),
    #[serde(rename = "ping")]
    Ping(PingMessage),
}

// Outbound

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JoinedMessage {
    pub room_id: String,
    pub is_host: bool,
    pub members: Vec<MemberSummary>,
    pub playback_state: PlaybackState,
    pub comment_history: Vec<Comment>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MemberJoinedMessage {
    pub user_id: String,
    pub display_name: String,
    pub is_host: bool,
    pub role: NetworkRole,
    pub connection_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MemberLeftMessage {
    pub user_id: String,
    pub display_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HostChangedMessage {
    pub new_host_id: String,
    pub new_host_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VideoSetMessage {
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommentReceivedMessage {
    pub comment: Comment,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignalRelayMessage {
    pub from: String,
    pub signal: Value,
    pub kind: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRelayMessage {
    pub from: String,
    pub candidate: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PeerRelayMessage {
    pub from: String,
    pub message: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PongMessage {
    pub date: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum SendMessage {
    #[serde(rename = "joined")]
    Joined(JoinedMessage),
    #[serde(rename = "memberJoined")]
    MemberJoined(MemberJoinedMessage),
    #[serde(rename = "memberLeft")]
    MemberLeft(MemberLeftMessage),
    #[serde(rename = "hostChanged")]
    HostChanged(HostChangedMessage),
    #[serde(rename = "videoSet")]
    VideoSet(VideoSetMessage),
    #[serde(rename = "play")]
    Play(PlaybackMessage),
    #[serde(rename = "pause")]
    Pause(PlaybackMessage),
    #[serde(rename = "seek")]
    Seek(PlaybackMessage),
    #[serde(rename = "commentReceived")]
    CommentReceived(CommentReceivedMessage),
    #[serde(rename = "signal")]
    Signal(SignalRelayMessage),
    #[serde(rename = "candidate")]
    Candidate(CandidateRelayMessage),
    #[serde(rename = "peerMessage")]
    PeerMessage(PeerRelayMessage),
    #[serde(rename = "error")]
    Error(ErrorMessage),
    #[serde(rename = "pong")]
    Pong(PongMessage),
}

impl SendMessage {
    /// Wire name of the message, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            SendMessage::Joined(_) => "joined",
            SendMessage::MemberJoined(_) => "memberJoined",
            SendMessage::MemberLeft(_) => "memberLeft",
            SendMessage::HostChanged(_) => "hostChanged",
            SendMessage::VideoSet(_) => "videoSet",
            SendMessage::Play(_) => "play",
            SendMessage::Pause(_) => "pause",
            SendMessage::Seek(_) => "seek",
            SendMessage::CommentReceived(_) => "commentReceived",
            SendMessage::Signal(_) => "signal",
            SendMessage::Candidate(_) => "candidate",
            SendMessage::PeerMessage(_) => "peerMessage",
            SendMessage::Error(_) => "error",
            SendMessage::Pong(_) => "pong",
        }
    }
}
