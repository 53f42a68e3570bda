use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::db::{PlaybackWriter, RoomStore};
use crate::models::{Member, MemberSummary, PlaybackState};
use crate::websocket::gateway::ConnectionGateway;

use super::RoomSettings;

/// In-memory state of one active room.
///
/// Only ever touched through the room's mutex, which is the single
/// serialization point for membership, playback and comment fan-out.
#[derive(Debug)]
pub struct RoomState {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub playback: PlaybackState,
    /// Kept in join order
    pub(crate) members: Vec<Member>,
    next_join_seq: u64,
    loaded: bool,
    /// Set once the room left the registry; holders of a stale handle must re-resolve
    pub(crate) evicted: bool,
}

impl RoomState {
    fn unloaded(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            created_at: Utc::now(),
            playback: PlaybackState::default(),
            members: Vec::new(),
            next_join_seq: 0,
            loaded: false,
            evicted: false,
        }
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, user_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn member_by_connection(&self, connection_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.connection_id == connection_id)
    }

    pub fn host(&self) -> Option<&Member> {
        self.members.iter().find(|m| m.is_host)
    }

    pub fn summaries(&self) -> Vec<MemberSummary> {
        self.members.iter().map(Member::summary).collect()
    }

    pub(crate) fn take_join_seq(&mut self) -> u64 {
        let seq = self.next_join_seq;
        self.next_join_seq += 1;
        seq
    }
}

/// Point-in-time copy of a room, for inspection
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub id: String,
    pub name: String,
    pub playback: PlaybackState,
    pub members: Vec<MemberSummary>,
}

impl RoomSnapshot {
    pub fn host_id(&self) -> Option<&str> {
        self.members.iter().find(|m| m.is_host).map(|m| m.user_id.as_str())
    }
}

/// Authoritative map of active rooms.
///
/// The map lock is held only to look up, insert or remove an entry; all room
/// work happens under the per-room mutex, so rooms never wait on each other.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Mutex<RoomState>>>>,
    pub(crate) store: Arc<dyn RoomStore>,
    pub(crate) gateway: Arc<ConnectionGateway>,
    pub(crate) writer: PlaybackWriter,
    pub(crate) settings: RoomSettings,
}

impl RoomRegistry {
    pub fn new(
        store: Arc<dyn RoomStore>,
        gateway: Arc<ConnectionGateway>,
        writer: PlaybackWriter,
        settings: RoomSettings,
    ) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            store,
            gateway,
            writer,
            settings,
        }
    }

    pub fn gateway(&self) -> &Arc<ConnectionGateway> {
        &self.gateway
    }

    pub fn store(&self) -> &Arc<dyn RoomStore> {
        &self.store
    }

    /// Lock the active room, materializing it on first use.
    ///
    /// A new room is seeded from its stored row, or defaults when there is
    /// none. No row is written. The caller must add a member before releasing
    /// the guard, or call [`RoomRegistry::evict_if_empty`].
    pub(crate) async fn get_or_create_room(&self, room_id: &str) -> OwnedMutexGuard<RoomState> {
        loop {
            let handle = {
                let mut rooms = self.rooms.write().await;
                rooms
                    .entry(room_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(RoomState::unloaded(room_id))))
                    .clone()
            };

            let mut room = handle.lock_owned().await;
            if room.evicted {
                continue;
            }
            if !room.loaded {
                self.hydrate(&mut room).await;
            }
            return room;
        }
    }

    /// Lock an active room, or `None` if it is not in the registry.
    ///
    /// A memberless entry left behind by an interrupted join or leave is
    /// evicted here and reported as absent.
    pub(crate) async fn lock_existing(&self, room_id: &str) -> Option<OwnedMutexGuard<RoomState>> {
        loop {
            let handle = self.rooms.read().await.get(room_id).cloned()?;
            let mut room = handle.lock_owned().await;
            if room.evicted {
                continue;
            }
            if room.members.is_empty() {
                self.evict_if_empty(&mut room).await;
                return None;
            }
            return Some(room);
        }
    }

    async fn hydrate(&self, room: &mut RoomState) {
        match self.store.get_room(&room.id).await {
            Ok(Some(row)) => {
                room.name = row.name.clone();
                room.created_at = row.created_at;
                room.playback = PlaybackState::from(&row);
                debug!("Room {} seeded from stored row", room.id);
            }
            Ok(None) => {
                debug!("Room {} has no stored row, using defaults", room.id);
            }
            Err(e) => {
                warn!("Failed to load room {} from store, using defaults: {}", room.id, e);
            }
        }
        room.loaded = true;
    }

    /// Drop the room from the registry once its last member is gone.
    /// The stored row is left untouched.
    pub(crate) async fn evict_if_empty(&self, room: &mut RoomState) -> bool {
        if !room.members.is_empty() || room.evicted {
            return false;
        }
        // The flag is only set once the entry is gone, so a cancelled wait
        // for the map lock leaves a plain empty room behind
        let mut rooms = self.rooms.write().await;
        rooms.remove(&room.id);
        room.evicted = true;
        drop(rooms);
        info!("Room {} is empty, evicted from registry", room.id);
        true
    }

    pub async fn contains(&self, room_id: &str) -> bool {
        self.rooms.read().await.contains_key(room_id)
    }

    pub async fn snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        let room = self.lock_existing(room_id).await?;
        Some(RoomSnapshot {
            id: room.id.clone(),
            name: room.name.clone(),
            playback: room.playback.clone(),
            members: room.summaries(),
        })
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn member_count(&self) -> usize {
        let handles: Vec<Arc<Mutex<RoomState>>> = self.rooms.read().await.values().cloned().collect();
        let mut total = 0;
        for handle in handles {
            total += handle.lock().await.members.len();
        }
        total
    }
}
