use tracing::debug;

use crate::models::{
    CandidateMessage, CandidateRelayMessage, FallbackRelayMessage, PeerRelayMessage, PeerStateMessage,
    SendMessage, SignalMessage, SignalRelayMessage,
};
use crate::room::RoomError;
use crate::state::AppState;
use crate::websocket::gateway::{Audience, Binding};
use crate::websocket::reply_error;

// Peer relay traffic is routed by connection id only. Payloads are opaque and
// no room lock is taken.

fn sender_binding(connection_id: &str, app_state: &AppState) -> Result<Binding, RoomError> {
    app_state
        .gateway
        .binding(connection_id)
        .ok_or(RoomError::NotJoined)
}

/// Deliver to a single peer of the sender's room
fn relay_to_peer(connection_id: &str, target: &str, message: SendMessage, app_state: &AppState) -> Result<(), RoomError> {
    let binding = sender_binding(connection_id, app_state)?;
    let same_room = app_state
        .gateway
        .binding(target)
        .map_or(false, |peer| peer.room_id == binding.room_id);
    if !same_room || !app_state.gateway.send(target, message) {
        return Err(RoomError::PeerNotFound(target.to_string()));
    }
    Ok(())
}

/// Handle SignalMessage
pub fn handle_signal_message(signal_msg: SignalMessage, connection_id: &str, app_state: &AppState) {
    debug!("Signal from {} to {}", connection_id, signal_msg.to);
    let message = SendMessage::Signal(SignalRelayMessage {
        from: connection_id.to_string(),
        signal: signal_msg.signal,
        kind: signal_msg.kind,
    });
    if let Err(e) = relay_to_peer(connection_id, &signal_msg.to, message, app_state) {
        reply_error(&app_state.gateway, connection_id, &e);
    }
}

/// Handle CandidateMessage
pub fn handle_candidate_message(candidate_msg: CandidateMessage, connection_id: &str, app_state: &AppState) {
    let message = SendMessage::Candidate(CandidateRelayMessage {
        from: connection_id.to_string(),
        candidate: candidate_msg.candidate,
    });
    if let Err(e) = relay_to_peer(connection_id, &candidate_msg.to, message, app_state) {
        reply_error(&app_state.gateway, connection_id, &e);
    }
}

/// Handle PeerStateMessage
pub fn handle_peer_state_message(peer_state_msg: PeerStateMessage, connection_id: &str, app_state: &AppState) {
    if let Err(e) = sender_binding(connection_id, app_state) {
        reply_error(&app_state.gateway, connection_id, &e);
        return;
    }
    debug!("{} reports {} connected peers", connection_id, peer_state_msg.connected_peers.len());
    app_state.gateway.set_peers(connection_id, peer_state_msg.connected_peers);
}

/// Handle FallbackRelayMessage: everyone else in the sender's room gets it
pub fn handle_fallback_relay_message(relay_msg: FallbackRelayMessage, connection_id: &str, app_state: &AppState) {
    let binding = match sender_binding(connection_id, app_state) {
        Ok(binding) => binding,
        Err(e) => {
            reply_error(&app_state.gateway, connection_id, &e);
            return;
        }
    };
    let message = SendMessage::PeerMessage(PeerRelayMessage {
        from: connection_id.to_string(),
        message: relay_msg.message,
    });
    app_state
        .gateway
        .broadcast(&binding.room_id, message, Audience::AllExcept(connection_id));
}
