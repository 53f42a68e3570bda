use tracing::debug;

use crate::models::SetVideoMessage;
use crate::room::{PlaybackCommand, RoomError};
use crate::state::AppState;
use crate::websocket::reply_error;

fn bound_room(connection_id: &str, app_state: &AppState) -> Result<String, RoomError> {
    app_state
        .gateway
        .binding(connection_id)
        .map(|binding| binding.room_id)
        .ok_or(RoomError::NotJoined)
}

/// Handle SetVideoMessage
pub async fn handle_set_video_message(set_video_msg: &SetVideoMessage, connection_id: &str, app_state: &AppState) {
    let result = match bound_room(connection_id, app_state) {
        Ok(room_id) => app_state
            .registry
            .set_video(&room_id, connection_id, &set_video_msg.url)
            .await
            .map(|_| ()),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        reply_error(&app_state.gateway, connection_id, &e);
    }
}

/// Handle play, pause and seek
pub async fn handle_playback_message(command: PlaybackCommand, connection_id: &str, app_state: &AppState) {
    let result = match bound_room(connection_id, app_state) {
        Ok(room_id) => {
            debug!("{:?} from {} in room {}", command, connection_id, room_id);
            app_state
                .registry
                .control_playback(&room_id, connection_id, command)
                .await
                .map(|_| ())
        }
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        reply_error(&app_state.gateway, connection_id, &e);
    }
}
