use chrono::Utc;
use tracing::{debug, info};

use crate::models::{
    Comment, HostChangedMessage, JoinedMessage, Member, MemberJoinedMessage, MemberLeftMessage,
    MemberSummary, NetworkRole, NetworkStats, PlaybackState, SendMessage,
};
use crate::websocket::gateway::{Audience, Binding};

use super::error::{Result, RoomError};
use super::RoomRegistry;

#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub room_id: String,
    pub user_id: String,
    pub display_name: String,
    pub connection_id: String,
    pub network_stats: Option<NetworkStats>,
}

/// What a joining member sees; also sent to it as `joined`
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub is_host: bool,
    pub members: Vec<MemberSummary>,
    pub playback_state: PlaybackState,
    pub comment_history: Vec<Comment>,
}

impl RoomRegistry {
    /// Add a member to a room, creating the room on first join.
    ///
    /// The first member of an empty room becomes host. A join for a user id
    /// that is already present takes over that slot: host flag and join order
    /// are kept, the connection and reported profile are refreshed.
    pub async fn join(&self, request: JoinRequest) -> Result<JoinOutcome> {
        let room_id = request.room_id.trim();
        let user_id = request.user_id.trim();
        if room_id.is_empty() {
            return Err(RoomError::Validation("roomId is required".to_string()));
        }
        if user_id.is_empty() {
            return Err(RoomError::Validation("userId is required".to_string()));
        }
        let display_name = match request.display_name.trim() {
            "" => user_id.to_string(),
            name => name.to_string(),
        };
        let connection_id = request.connection_id.as_str();

        // A connection speaks for one slot at a time
        if let Some(previous) = self.gateway.binding(connection_id) {
            if previous.room_id != room_id || previous.user_id != user_id {
                self.leave_slot(&previous.room_id, &previous.user_id, Some(connection_id)).await;
            }
        }

        let role = NetworkRole::classify(request.network_stats.as_ref());
        let mut room = self.get_or_create_room(room_id).await;

        if !self.gateway.bind(connection_id, room_id, user_id) {
            self.evict_if_empty(&mut room).await;
            return Err(RoomError::ConnectionClosed(connection_id.to_string()));
        }

        let existing = room.members.iter().position(|m| m.user_id == user_id);
        let member = match existing {
            Some(index) => {
                let slot = &mut room.members[index];
                let previous_connection = std::mem::replace(&mut slot.connection_id, connection_id.to_string());
                slot.display_name = display_name;
                slot.role = role;
                slot.network_stats = request.network_stats;
                let member = slot.clone();

                if previous_connection != connection_id {
                    self.gateway.unbind_if(&previous_connection, room_id, user_id);
                    info!("{} reconnected to room {}, replacing connection {}", user_id, room_id, previous_connection);
                }
                member
            }
            None => {
                let member = Member {
                    user_id: user_id.to_string(),
                    display_name,
                    connection_id: connection_id.to_string(),
                    is_host: room.members.is_empty(),
                    role,
                    network_stats: request.network_stats,
                    joined_at: Utc::now(),
                    join_seq: room.take_join_seq(),
                };
                room.members.push(member.clone());
                member
            }
        };

        // Read under the room lock: anything broadcast after this point reaches the new member
        let comment_history = self.comment_history(room_id).await;

        let outcome = JoinOutcome {
            is_host: member.is_host,
            members: room.summaries(),
            playback_state: room.playback.clone(),
            comment_history,
        };

        self.gateway.send(
            connection_id,
            SendMessage::Joined(JoinedMessage {
                room_id: room_id.to_string(),
                is_host: outcome.is_host,
                members: outcome.members.clone(),
                playback_state: outcome.playback_state.clone(),
                comment_history: outcome.comment_history.clone(),
            }),
        );
        self.gateway.broadcast(
            room_id,
            SendMessage::MemberJoined(MemberJoinedMessage {
                user_id: member.user_id.clone(),
                display_name: member.display_name.clone(),
                is_host: member.is_host,
                role: member.role,
                connection_id: member.connection_id.clone(),
            }),
            Audience::AllExcept(connection_id),
        );

        info!(
            "{} joined room {} (host: {}, role: {:?}, members: {})",
            member.display_name,
            room_id,
            member.is_host,
            member.role,
            room.members.len()
        );
        Ok(outcome)
    }

    /// Remove a member. Returns false, without error, if it was not there.
    pub async fn leave(&self, room_id: &str, user_id: &str) -> bool {
        self.leave_slot(room_id, user_id, None).await
    }

    /// Explicit leave of whatever slot the connection is bound to
    pub async fn leave_connection(&self, connection_id: &str) -> bool {
        match self.gateway.binding(connection_id) {
            Some(binding) => self.leave_slot(&binding.room_id, &binding.user_id, Some(connection_id)).await,
            None => false,
        }
    }

    /// Leave path for a closed connection.
    ///
    /// The slot is only removed while it still belongs to this connection, so
    /// a stale socket closing after a reconnect does not evict the user.
    pub async fn disconnect(&self, connection_id: &str, binding: Binding) -> bool {
        debug!("Connection {} closed while bound to {}/{}", connection_id, binding.room_id, binding.user_id);
        self.leave_slot(&binding.room_id, &binding.user_id, Some(connection_id)).await
    }

    pub(crate) async fn leave_slot(&self, room_id: &str, user_id: &str, connection_id: Option<&str>) -> bool {
        let Some(mut room) = self.lock_existing(room_id).await else {
            debug!("Leave for {} ignored, room {} is not active", user_id, room_id);
            return false;
        };

        let Some(index) = room
            .members
            .iter()
            .position(|m| m.user_id == user_id && connection_id.map_or(true, |c| m.connection_id == c))
        else {
            debug!("Leave for {} ignored, not a member of room {}", user_id, room_id);
            return false;
        };

        let member = room.members.remove(index);
        self.gateway.unbind_if(&member.connection_id, room_id, user_id);
        info!("{} left room {}", member.display_name, room_id);

        if self.evict_if_empty(&mut room).await {
            return true;
        }

        self.gateway.broadcast(
            room_id,
            SendMessage::MemberLeft(MemberLeftMessage {
                user_id: member.user_id.clone(),
                display_name: member.display_name.clone(),
            }),
            Audience::Everyone,
        );

        if member.is_host {
            // Earliest remaining joiner inherits playback authority
            if let Some(next) = room.members.iter_mut().min_by_key(|m| m.join_seq) {
                next.is_host = true;
                let message = HostChangedMessage {
                    new_host_id: next.user_id.clone(),
                    new_host_name: next.display_name.clone(),
                };
                info!("New host in room {}: {}", room_id, message.new_host_name);
                self.gateway.broadcast(room_id, SendMessage::HostChanged(message), Audience::Everyone);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::db::RoomStore;
    use crate::models::{NetworkRole, NetworkStats, SendMessage};
    use crate::room::test_support::Harness;
    use crate::room::JoinRequest;

    fn host_count(snapshot: &crate::room::RoomSnapshot) -> usize {
        snapshot.members.iter().filter(|m| m.is_host).count()
    }

    #[tokio::test]
    async fn test_first_joiner_is_host() {
        let h = Harness::new();
        let mut c1 = h.connect();
        let c2 = h.connect();

        let first = h.join(&c1, "roomA", "u1").await;
        let second = h.join(&c2, "roomA", "u2").await;

        assert!(first.is_host);
        assert!(!second.is_host);
        assert_eq!(second.members.len(), 2);

        let messages = c1.drain();
        assert!(matches!(&messages[0], SendMessage::Joined(j) if j.is_host));
        assert!(matches!(&messages[1], SendMessage::MemberJoined(m) if m.user_id == "u2" && !m.is_host));
    }

    #[tokio::test]
    async fn test_joiner_does_not_receive_own_member_joined() {
        let h = Harness::new();
        let mut c1 = h.connect();
        h.join(&c1, "roomA", "u1").await;

        let messages = c1.drain();
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], SendMessage::Joined(_)));
    }

    #[tokio::test]
    async fn test_host_failover_is_fifo() {
        let h = Harness::new();
        let c1 = h.connect();
        let mut c2 = h.connect();
        let mut c3 = h.connect();
        h.join(&c1, "roomA", "u1").await;
        h.join(&c2, "roomA", "u2").await;
        h.join(&c3, "roomA", "u3").await;
        c2.drain();
        c3.drain();

        assert!(h.registry.leave("roomA", "u1").await);

        let snapshot = h.registry.snapshot("roomA").await.unwrap();
        assert_eq!(snapshot.host_id(), Some("u2"));
        assert_eq!(host_count(&snapshot), 1);

        for client in [&mut c2, &mut c3] {
            let messages = client.drain();
            assert_eq!(messages.len(), 2);
            assert!(matches!(&messages[0], SendMessage::MemberLeft(m) if m.user_id == "u1"));
            assert!(matches!(&messages[1], SendMessage::HostChanged(m) if m.new_host_id == "u2"));
        }
        assert!(!snapshot.members.iter().find(|m| m.user_id == "u3").unwrap().is_host);
    }

    #[tokio::test]
    async fn test_failover_skips_departed_members() {
        let h = Harness::new();
        let clients: Vec<_> = (0..4).map(|_| h.connect()).collect();
        for (i, client) in clients.iter().enumerate() {
            h.join(client, "roomA", &format!("u{}", i)).await;
        }

        // u1 leaves before the host; u2 is the earliest remaining
        h.registry.leave("roomA", "u1").await;
        h.registry.leave("roomA", "u0").await;

        let snapshot = h.registry.snapshot("roomA").await.unwrap();
        assert_eq!(snapshot.host_id(), Some("u2"));
        assert_eq!(host_count(&snapshot), 1);
    }

    #[tokio::test]
    async fn test_leave_twice_emits_one_member_left() {
        let h = Harness::new();
        let c1 = h.connect();
        let mut c2 = h.connect();
        let c3 = h.connect();
        h.join(&c1, "roomA", "u1").await;
        h.join(&c2, "roomA", "u2").await;
        h.join(&c3, "roomA", "u3").await;
        c2.drain();

        assert!(h.registry.leave("roomA", "u3").await);
        assert!(!h.registry.leave("roomA", "u3").await);

        let left: Vec<_> = c2
            .drain()
            .into_iter()
            .filter(|m| matches!(m, SendMessage::MemberLeft(_)))
            .collect();
        assert_eq!(left.len(), 1);
        assert!(!h.registry.leave("no-such-room", "u3").await);
    }

    #[tokio::test]
    async fn test_last_leave_evicts_and_rejoin_reloads_stored_state() {
        let h = Harness::new();
        h.store.create_room("roomA", "Movie night").await.unwrap();
        let c1 = h.connect();
        h.join(&c1, "roomA", "u1").await;

        h.registry.set_video("roomA", &c1.id(), "https://a.test/v.mp4").await.unwrap();
        h.registry.play("roomA", &c1.id(), 30.0).await.unwrap();
        h.writer.flush().await;

        assert!(h.registry.leave("roomA", "u1").await);
        assert!(!h.registry.contains("roomA").await);
        assert_eq!(h.registry.room_count().await, 0);

        let c2 = h.connect();
        let outcome = h.join(&c2, "roomA", "u2").await;
        assert!(outcome.is_host);
        assert_eq!(outcome.playback_state.video_url.as_deref(), Some("https://a.test/v.mp4"));
        assert_eq!(outcome.playback_state.position_seconds, 30.0);
        assert!(outcome.playback_state.is_playing);
        assert_eq!(h.registry.snapshot("roomA").await.unwrap().name, "Movie night");
    }

    #[tokio::test]
    async fn test_rejoin_without_stored_row_uses_defaults() {
        let h = Harness::new();
        let c1 = h.connect();
        h.join(&c1, "roomB", "u1").await;
        h.registry.set_video("roomB", &c1.id(), "https://a.test/v.mp4").await.unwrap();
        h.registry.leave("roomB", "u1").await;

        let c2 = h.connect();
        let outcome = h.join(&c2, "roomB", "u2").await;
        assert_eq!(outcome.playback_state, crate::models::PlaybackState::default());
    }

    #[tokio::test]
    async fn test_network_role_on_join() {
        let h = Harness::new();
        let c1 = h.connect();
        let c2 = h.connect();
        let c3 = h.connect();

        for (client, user, stats) in [
            (&c1, "u1", Some(NetworkStats { bandwidth: 6000.0, latency: 50.0 })),
            (&c2, "u2", Some(NetworkStats { bandwidth: 1000.0, latency: 50.0 })),
            (&c3, "u3", None),
        ] {
            h.registry
                .join(JoinRequest {
                    room_id: "roomA".to_string(),
                    user_id: user.to_string(),
                    display_name: user.to_string(),
                    connection_id: client.id(),
                    network_stats: stats,
                })
                .await
                .unwrap();
        }

        let snapshot = h.registry.snapshot("roomA").await.unwrap();
        let role = |id: &str| snapshot.members.iter().find(|m| m.user_id == id).unwrap().role;
        assert_eq!(role("u1"), NetworkRole::Super);
        assert_eq!(role("u2"), NetworkRole::Normal);
        assert_eq!(role("u3"), NetworkRole::Normal);
    }

    #[tokio::test]
    async fn test_join_validation() {
        let h = Harness::new();
        let c1 = h.connect();
        let request = |room: &str, user: &str| JoinRequest {
            room_id: room.to_string(),
            user_id: user.to_string(),
            display_name: String::new(),
            connection_id: c1.id(),
            network_stats: None,
        };

        let err = h.registry.join(request("", "u1")).await.unwrap_err();
        assert_eq!(err.code(), "validation");
        let err = h.registry.join(request("roomA", "  ")).await.unwrap_err();
        assert_eq!(err.code(), "validation");
        assert_eq!(h.registry.room_count().await, 0);

        // Missing display name falls back to the user id
        let outcome = h.registry.join(request("roomA", "u1")).await.unwrap();
        assert_eq!(outcome.members[0].display_name, "u1");
    }

    #[tokio::test]
    async fn test_reconnect_keeps_slot_and_host() {
        let h = Harness::new();
        let old = h.connect();
        let mut other = h.connect();
        h.join(&old, "roomA", "u1").await;
        h.join(&other, "roomA", "u2").await;
        other.drain();

        let new = h.connect();
        let outcome = h.join(&new, "roomA", "u1").await;
        assert!(outcome.is_host);
        assert_eq!(outcome.members.len(), 2);
        assert_eq!(outcome.members[0].user_id, "u1");
        assert_eq!(outcome.members[0].connection_id, new.id());
        assert!(h.gateway.binding(&old.id()).is_none());

        // The stale socket closing must not remove the reconnected user
        let binding = crate::websocket::gateway::Binding {
            room_id: "roomA".to_string(),
            user_id: "u1".to_string(),
        };
        assert!(!h.registry.disconnect(&old.id(), binding).await);
        let snapshot = h.registry.snapshot("roomA").await.unwrap();
        assert_eq!(snapshot.members.len(), 2);
        assert_eq!(snapshot.host_id(), Some("u1"));

        let messages = other.drain();
        assert!(matches!(&messages[..], [SendMessage::MemberJoined(m)] if m.user_id == "u1"));
    }

    #[tokio::test]
    async fn test_disconnect_via_lease_drop() {
        let h = Harness::new();
        let mut c1 = h.connect();
        let mut c2 = h.connect();
        h.join(&c1, "roomA", "u1").await;
        h.join(&c2, "roomA", "u2").await;
        c2.drain();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let registry = h.registry.clone();
        let connection_id = c1.id();
        c1.lease.on_close(move |binding| {
            tx.send((connection_id, binding)).unwrap();
        });
        drop(c1);

        let (connection_id, binding) = rx.recv().await.unwrap();
        assert!(registry.disconnect(&connection_id, binding.unwrap()).await);

        let snapshot = h.registry.snapshot("roomA").await.unwrap();
        assert_eq!(snapshot.host_id(), Some("u2"));
        let messages = c2.drain();
        assert!(matches!(&messages[0], SendMessage::MemberLeft(m) if m.user_id == "u1"));
        assert!(matches!(&messages[1], SendMessage::HostChanged(m) if m.new_host_id == "u2"));
    }

    #[tokio::test]
    async fn test_joining_another_room_leaves_the_first() {
        let h = Harness::new();
        let c1 = h.connect();
        h.join(&c1, "roomA", "u1").await;
        h.join(&c1, "roomB", "u1").await;

        assert!(!h.registry.contains("roomA").await);
        assert_eq!(h.registry.snapshot("roomB").await.unwrap().members.len(), 1);
        assert_eq!(h.gateway.binding(&c1.id()).unwrap().room_id, "roomB");
    }

    #[tokio::test]
    async fn test_join_with_closed_connection_is_rejected() {
        let h = Harness::new();
        let c1 = h.connect();
        let connection_id = c1.id();
        drop(c1);

        let err = h
            .registry
            .join(JoinRequest {
                room_id: "roomA".to_string(),
                user_id: "u1".to_string(),
                display_name: "u1".to_string(),
                connection_id,
                network_stats: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "connection_closed");
        assert!(!h.registry.contains("roomA").await);
    }

    #[tokio::test]
    async fn test_concurrent_churn_keeps_single_host() {
        let h = Harness::new();
        let clients: Vec<_> = (0..16).map(|_| h.connect()).collect();

        let mut tasks = Vec::new();
        for (i, client) in clients.iter().enumerate() {
            let registry = h.registry.clone();
            let connection_id = client.id();
            tasks.push(tokio::spawn(async move {
                let user_id = format!("u{}", i);
                registry
                    .join(JoinRequest {
                        room_id: "busy".to_string(),
                        user_id: user_id.clone(),
                        display_name: user_id.clone(),
                        connection_id,
                        network_stats: None,
                    })
                    .await
                    .unwrap();
                if i % 2 == 0 {
                    registry.leave("busy", &user_id).await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let snapshot = h.registry.snapshot("busy").await.unwrap();
        assert_eq!(snapshot.members.len(), 8);
        assert_eq!(host_count(&snapshot), 1);
    }
}
