use tracing::info;

use crate::models::JoinMessage;
use crate::room::JoinRequest;
use crate::state::AppState;
use crate::websocket::reply_error;

/// Handle JoinMessage. The `joined` reply and `memberJoined` broadcast are
/// sent by the registry.
pub async fn handle_join_message(join_msg: &JoinMessage, connection_id: &str, app_state: &AppState) {
    info!("Join received for room {} from user {}", join_msg.room_id, join_msg.user_id);

    let request = JoinRequest {
        room_id: join_msg.room_id.clone(),
        user_id: join_msg.user_id.clone(),
        display_name: join_msg.display_name.clone(),
        connection_id: connection_id.to_string(),
        network_stats: join_msg.network_stats,
    };
    if let Err(e) = app_state.registry.join(request).await {
        reply_error(&app_state.gateway, connection_id, &e);
    }
}

/// Handle LeaveMessage. Leaving while not in a room is a no-op.
pub async fn handle_leave_message(connection_id: &str, app_state: &AppState) {
    if !app_state.registry.leave_connection(connection_id).await {
        info!("Leave from {} ignored, not in a room", connection_id);
    }
}
