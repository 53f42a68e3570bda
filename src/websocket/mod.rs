pub mod gateway;
pub mod handler;
pub mod msg_join_handler;
pub mod msg_playback_handler;
pub mod msg_comment_handler;
pub mod msg_relay_handler;
pub mod msg_ping_handler;

pub use gateway::{Audience, Binding, ConnectionGateway, ConnectionLease};
pub use handler::websocket_handler;

use tracing::warn;

use crate::models::{ErrorMessage, SendMessage};
use crate::room::RoomError;

/// Report a rejected request to the connection that sent it, and nobody else
pub fn reply_error(gateway: &ConnectionGateway, connection_id: &str, err: &RoomError) {
    warn!(connection_id = %connection_id, code = err.code(), "Request rejected: {}", err);
    gateway.send(
        connection_id,
        SendMessage::Error(ErrorMessage {
            code: err.code().to_string(),
            message: err.to_string(),
        }),
    );
}
