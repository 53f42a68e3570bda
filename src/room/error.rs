use thiserror::Error;

use crate::db::StoreError;

/// Errors surfaced by room operations
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Malformed message: {0}")]
    InvalidMessage(String),

    #[error("Only the host can control playback")]
    NotHost,

    #[error("Room not found: {0}")]
    NotFound(String),

    #[error("Connection is not a member of room {0}")]
    NotMember(String),

    #[error("Join a room first")]
    NotJoined,

    #[error("No peer {0} in this room")]
    PeerNotFound(String),

    #[error("Connection {0} is closed")]
    ConnectionClosed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl RoomError {
    /// Stable code sent to clients in `error` messages
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::Validation(_) => "validation",
            RoomError::InvalidMessage(_) => "invalid_message",
            RoomError::NotHost => "not_host",
            RoomError::NotFound(_) => "room_not_found",
            RoomError::NotMember(_) | RoomError::NotJoined => "not_member",
            RoomError::PeerNotFound(_) => "peer_not_found",
            RoomError::ConnectionClosed(_) => "connection_closed",
            RoomError::Storage(_) => "storage",
        }
    }
}

/// Result type for room operations
pub type Result<T> = std::result::Result<T, RoomError>;
