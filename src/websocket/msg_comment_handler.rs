use crate::models::SendCommentMessage;
use crate::state::AppState;
use crate::websocket::reply_error;

/// Handle SendCommentMessage. The author gets its own comment back through
/// the room broadcast.
pub async fn handle_comment_message(comment_msg: SendCommentMessage, connection_id: &str, app_state: &AppState) {
    let result = app_state
        .registry
        .send_comment_from(connection_id, comment_msg.text, comment_msg.position, comment_msg.reply_to_id)
        .await;
    if let Err(e) = result {
        reply_error(&app_state.gateway, connection_id, &e);
    }
}
