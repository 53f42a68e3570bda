use std::sync::Arc;
use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, State},
    response::Response,
};
use tracing::{info, error, debug};
use futures_util::{StreamExt, SinkExt};
use tokio::sync::oneshot;

use crate::state::AppState;
use crate::models::ReceivedMessage;
use crate::room::{PlaybackCommand, RoomError};
use crate::websocket::reply_error;
use crate::websocket::msg_join_handler::{handle_join_message, handle_leave_message};
use crate::websocket::msg_playback_handler::{handle_playback_message, handle_set_video_message};
use crate::websocket::msg_comment_handler::handle_comment_message;
use crate::websocket::msg_relay_handler::{
    handle_candidate_message, handle_fallback_relay_message, handle_peer_state_message, handle_signal_message,
};
use crate::websocket::msg_ping_handler::handle_ping_message;

/// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    debug!("New WebSocket connection attempt");
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let (mut lease, mut outbound) = app_state.gateway.accept();
    let connection_id = lease.id().to_string();

    // However the socket ends, a bound member leaves its room exactly once
    let registry = app_state.registry.clone();
    let closed_id = connection_id.clone();
    lease.on_close(move |binding| {
        let Some(binding) = binding else { return };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    registry.disconnect(&closed_id, binding).await;
                });
            }
            Err(_) => debug!("Runtime gone, skipping leave for {}", closed_id),
        }
    });

    info!("WebSocket connection established with connection_id: {}", connection_id);
    let (mut sender, mut receiver) = socket.split();

    // Drain the outbound queue into the socket
    let send_id = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize {} for {}: {}", message.kind(), send_id, e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Listen to the websocket for incoming messages. Shutdown is only observed
    // between messages, a dispatch in progress always runs to completion.
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let recv_state = app_state.clone();
    let recv_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                frame = receiver.next() => frame,
                _ = &mut shutdown_rx => break,
            };
            let Some(frame) = frame else { break };
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(Message::Binary(_)) => {
                    debug!("Ignoring binary frame on {}", recv_id);
                    continue;
                }
                // Ping/pong frames are answered by axum
                Ok(_) => continue,
                Err(e) => {
                    debug!("WebSocket error on {}: {}", recv_id, e);
                    break;
                }
            };

            let message: ReceivedMessage = match serde_json::from_str(&text) {
                Ok(message) => message,
                Err(e) => {
                    error!("Failed to parse message on {}: {}", recv_id, e);
                    reply_error(&recv_state.gateway, &recv_id, &RoomError::InvalidMessage(e.to_string()));
                    continue;
                }
            };
            dispatch(&recv_state, &recv_id, message).await;
        }
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut send_task) => {
            let _ = shutdown_tx.send(());
            if let Err(e) = recv_task.await {
                error!("Receive task for {} failed: {}", connection_id, e);
            }
        },
        _ = (&mut recv_task) => send_task.abort(),
    };

    drop(lease);
    info!("WebSocket connection {} terminated", connection_id);
}

/// Route one client message to its handler. Messages of one connection are
/// handled strictly one after another.
pub async fn dispatch(app_state: &AppState, connection_id: &str, message: ReceivedMessage) {
    match message {
        ReceivedMessage::Join(msg) => handle_join_message(&msg, connection_id, app_state).await,
        ReceivedMessage::Leave(_) => handle_leave_message(connection_id, app_state).await,
        ReceivedMessage::SetVideo(msg) => handle_set_video_message(&msg, connection_id, app_state).await,
        ReceivedMessage::Play(msg) => {
            handle_playback_message(PlaybackCommand::Play(msg.position), connection_id, app_state).await
        }
        ReceivedMessage::Pause(msg) => {
            handle_playback_message(PlaybackCommand::Pause(msg.position), connection_id, app_state).await
        }
        ReceivedMessage::Seek(msg) => {
            handle_playback_message(PlaybackCommand::Seek(msg.position), connection_id, app_state).await
        }
        ReceivedMessage::SendComment(msg) => handle_comment_message(msg, connection_id, app_state).await,
        ReceivedMessage::Signal(msg) => handle_signal_message(msg, connection_id, app_state),
        ReceivedMessage::Candidate(msg) => handle_candidate_message(msg, connection_id, app_state),
        ReceivedMessage::PeerState(msg) => handle_peer_state_message(msg, connection_id, app_state),
        ReceivedMessage::FallbackRelay(msg) => handle_fallback_relay_message(msg, connection_id, app_state),
        ReceivedMessage::Ping(msg) => handle_ping_message(&msg, connection_id, app_state),
    }
}
