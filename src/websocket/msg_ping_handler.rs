use tracing::debug;
use chrono::Utc;

use crate::models::{PingMessage, PongMessage, SendMessage};
use crate::state::AppState;

/// Handle PingMessage
pub fn handle_ping_message(_ping_msg: &PingMessage, connection_id: &str, app_state: &AppState) {
    debug!("Ping message received from {}", connection_id);

    let pong = SendMessage::Pong(PongMessage { date: Utc::now().to_rfc3339() });
    app_state.gateway.send(connection_id, pong);
}
