use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::SendMessage;

/// The (room, user) pair a connection currently speaks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room_id: String,
    pub user_id: String,
}

/// Which room members receive a broadcast
#[derive(Debug, Clone, Copy)]
pub enum Audience<'a> {
    Everyone,
    AllExcept(&'a str),
}

struct ConnectionEntry {
    sender: UnboundedSender<SendMessage>,
    binding: Option<Binding>,
    /// Last peer list reported by the client, kept uninterpreted
    peers: Vec<String>,
}

#[derive(Default)]
struct GatewayInner {
    connections: HashMap<String, ConnectionEntry>,
    /// room_id -> connections bound to it
    rooms: HashMap<String, HashSet<String>>,
}

impl GatewayInner {
    fn detach(&mut self, connection_id: &str, binding: &Binding) {
        if let Some(conns) = self.rooms.get_mut(&binding.room_id) {
            conns.remove(connection_id);
            if conns.is_empty() {
                self.rooms.remove(&binding.room_id);
            }
        }
    }
}

/// Owns the outbound queue of every connected client.
///
/// Sending never awaits: each connection has an unbounded queue drained by its
/// socket writer task, so messages queued for one connection are delivered in
/// the order the sends were issued.
#[derive(Default)]
pub struct ConnectionGateway {
    inner: RwLock<GatewayInner>,
}

impl ConnectionGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection. Dropping the returned lease deregisters it.
    pub fn accept(self: &Arc<Self>) -> (ConnectionLease, UnboundedReceiver<SendMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4().to_string();

        self.inner.write().connections.insert(
            connection_id.clone(),
            ConnectionEntry {
                sender: tx,
                binding: None,
                peers: Vec::new(),
            },
        );
        debug!(connection_id = %connection_id, "Connection registered");

        let lease = ConnectionLease {
            connection_id,
            gateway: Arc::clone(self),
            on_close: None,
        };
        (lease, rx)
    }

    /// Queue a message for one connection. Returns false if it is gone.
    pub fn send(&self, connection_id: &str, message: SendMessage) -> bool {
        let inner = self.inner.read();
        match inner.connections.get(connection_id) {
            Some(entry) => entry.sender.send(message).is_ok(),
            None => {
                debug!(connection_id = %connection_id, kind = message.kind(), "Dropping message for unknown connection");
                false
            }
        }
    }

    /// Queue a message for every connection bound to a room
    pub fn broadcast(&self, room_id: &str, message: SendMessage, audience: Audience<'_>) -> usize {
        let inner = self.inner.read();
        let Some(conns) = inner.rooms.get(room_id) else {
            return 0;
        };

        let mut sent_count = 0;
        for connection_id in conns {
            if let Audience::AllExcept(excluded) = audience {
                if excluded == connection_id {
                    continue;
                }
            }
            if let Some(entry) = inner.connections.get(connection_id) {
                if entry.sender.send(message.clone()).is_ok() {
                    sent_count += 1;
                } else {
                    warn!(room_id = %room_id, connection_id = %connection_id, "Outbound queue closed");
                }
            }
        }

        debug!(room_id = %room_id, kind = message.kind(), sent_count, "Broadcast complete");
        sent_count
    }

    /// Bind a connection to a member slot, replacing any previous binding
    pub fn bind(&self, connection_id: &str, room_id: &str, user_id: &str) -> bool {
        let mut inner = self.inner.write();
        let binding = Binding {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
        };

        // Peer links describe the previous room, if any
        let previous = match inner.connections.get_mut(connection_id) {
            Some(entry) => {
                entry.peers.clear();
                entry.binding.replace(binding)
            }
            None => return false,
        };
        if let Some(previous) = previous {
            inner.detach(connection_id, &previous);
        }
        inner
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
        true
    }

    /// Clear the binding of a connection if it still points at the given slot
    pub fn unbind_if(&self, connection_id: &str, room_id: &str, user_id: &str) -> bool {
        let mut inner = self.inner.write();
        let matches = inner
            .connections
            .get(connection_id)
            .and_then(|entry| entry.binding.as_ref())
            .map(|b| b.room_id == room_id && b.user_id == user_id)
            .unwrap_or(false);
        if !matches {
            return false;
        }

        let binding = inner.connections.get_mut(connection_id).and_then(|entry| {
            entry.peers.clear();
            entry.binding.take()
        });
        if let Some(binding) = binding {
            inner.detach(connection_id, &binding);
        }
        true
    }

    pub fn binding(&self, connection_id: &str) -> Option<Binding> {
        self.inner
            .read()
            .connections
            .get(connection_id)
            .and_then(|entry| entry.binding.clone())
    }

    pub fn set_peers(&self, connection_id: &str, peers: Vec<String>) -> bool {
        match self.inner.write().connections.get_mut(connection_id) {
            Some(entry) => {
                entry.peers = peers;
                true
            }
            None => false,
        }
    }

    pub fn peers(&self, connection_id: &str) -> Vec<String> {
        self.inner
            .read()
            .connections
            .get(connection_id)
            .map(|entry| entry.peers.clone())
            .unwrap_or_default()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.read().connections.len()
    }

    pub fn bound_connection_count(&self) -> usize {
        self.inner.read().rooms.values().map(HashSet::len).sum()
    }

    pub fn peer_link_count(&self) -> usize {
        self.inner.read().connections.values().map(|e| e.peers.len()).sum()
    }

    /// Remove a connection, returning what it was bound to
    fn release(&self, connection_id: &str) -> Option<Binding> {
        let mut inner = self.inner.write();
        let entry = inner.connections.remove(connection_id)?;
        let binding = entry.binding;
        if let Some(binding) = &binding {
            inner.detach(connection_id, binding);
        }
        info!(connection_id = %connection_id, bound = binding.is_some(), "Connection released");
        binding
    }
}

type CloseHook = Box<dyn FnOnce(Option<Binding>) + Send>;

/// Registration of one connection with the gateway.
///
/// Dropping the lease removes the connection exactly once and hands its last
/// binding to the close hook, however the socket task ended.
pub struct ConnectionLease {
    connection_id: String,
    gateway: Arc<ConnectionGateway>,
    on_close: Option<CloseHook>,
}

impl ConnectionLease {
    pub fn id(&self) -> &str {
        &self.connection_id
    }

    pub fn on_close(&mut self, hook: impl FnOnce(Option<Binding>) + Send + 'static) {
        self.on_close = Some(Box::new(hook));
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        let binding = self.gateway.release(&self.connection_id);
        if let Some(hook) = self.on_close.take() {
            hook(binding);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlaybackMessage, PongMessage};

    fn pong() -> SendMessage {
        SendMessage::Pong(PongMessage { date: "now".to_string() })
    }

    #[tokio::test]
    async fn test_send_to_one() {
        let gateway = Arc::new(ConnectionGateway::new());
        let (lease, mut rx) = gateway.accept();

        assert!(gateway.send(lease.id(), pong()));
        assert!(matches!(rx.recv().await, Some(SendMessage::Pong(_))));
        assert!(!gateway.send("unknown", pong()));
    }

    #[tokio::test]
    async fn test_broadcast_audience() {
        let gateway = Arc::new(ConnectionGateway::new());
        let (a, mut rx_a) = gateway.accept();
        let (b, mut rx_b) = gateway.accept();
        let (c, mut rx_c) = gateway.accept();
        gateway.bind(a.id(), "r1", "ua");
        gateway.bind(b.id(), "r1", "ub");
        gateway.bind(c.id(), "r2", "uc");

        let play = SendMessage::Play(PlaybackMessage { position: 1.0 });
        assert_eq!(gateway.broadcast("r1", play.clone(), Audience::Everyone), 2);
        assert_eq!(gateway.broadcast("r1", play, Audience::AllExcept(a.id())), 1);

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_preserves_order() {
        let gateway = Arc::new(ConnectionGateway::new());
        let (a, mut rx) = gateway.accept();
        gateway.bind(a.id(), "r1", "ua");

        for i in 0..10 {
            gateway.broadcast("r1", SendMessage::Seek(PlaybackMessage { position: i as f64 }), Audience::Everyone);
        }
        for i in 0..10 {
            match rx.try_recv().unwrap() {
                SendMessage::Seek(m) => assert_eq!(m.position, i as f64),
                other => panic!("unexpected message: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_rebind_moves_connection() {
        let gateway = Arc::new(ConnectionGateway::new());
        let (a, _rx) = gateway.accept();
        gateway.bind(a.id(), "r1", "ua");
        gateway.bind(a.id(), "r2", "ua");

        assert_eq!(gateway.broadcast("r1", pong(), Audience::Everyone), 0);
        assert_eq!(gateway.broadcast("r2", pong(), Audience::Everyone), 1);
        assert_eq!(gateway.bound_connection_count(), 1);
    }

    #[tokio::test]
    async fn test_unbind_only_matching_slot() {
        let gateway = Arc::new(ConnectionGateway::new());
        let (a, _rx) = gateway.accept();
        gateway.bind(a.id(), "r1", "ua");

        assert!(!gateway.unbind_if(a.id(), "r1", "someone-else"));
        assert!(gateway.binding(a.id()).is_some());
        assert!(gateway.unbind_if(a.id(), "r1", "ua"));
        assert!(gateway.binding(a.id()).is_none());
        assert!(!gateway.unbind_if(a.id(), "r1", "ua"));
    }

    #[tokio::test]
    async fn test_unbind_drops_peer_links() {
        let gateway = Arc::new(ConnectionGateway::new());
        let (a, _rx_a) = gateway.accept();
        let (b, _rx_b) = gateway.accept();
        gateway.bind(a.id(), "r1", "ua");
        gateway.bind(b.id(), "r1", "ub");
        gateway.set_peers(a.id(), vec![b.id().to_string()]);
        gateway.set_peers(b.id(), vec![a.id().to_string()]);
        assert_eq!(gateway.peer_link_count(), 2);

        // A mismatched slot leaves the links alone
        assert!(!gateway.unbind_if(a.id(), "r1", "someone-else"));
        assert_eq!(gateway.peer_link_count(), 2);

        assert!(gateway.unbind_if(a.id(), "r1", "ua"));
        assert!(gateway.peers(a.id()).is_empty());
        assert_eq!(gateway.peer_link_count(), 1);

        // Moving to another room starts without links
        gateway.bind(b.id(), "r2", "ub");
        assert_eq!(gateway.peer_link_count(), 0);
    }

    #[tokio::test]
    async fn test_lease_drop_runs_close_hook_once() {
        let gateway = Arc::new(ConnectionGateway::new());
        let (mut lease, _rx) = gateway.accept();
        let id = lease.id().to_string();
        gateway.bind(&id, "r1", "ua");
        gateway.set_peers(&id, vec!["p1".to_string(), "p2".to_string()]);
        assert_eq!(gateway.peer_link_count(), 2);

        let (hook_tx, mut hook_rx) = mpsc::unbounded_channel();
        lease.on_close(move |binding| {
            hook_tx.send(binding).unwrap();
        });
        drop(lease);

        let binding = hook_rx.recv().await.unwrap();
        assert_eq!(binding, Some(Binding { room_id: "r1".to_string(), user_id: "ua".to_string() }));
        assert!(hook_rx.recv().await.is_none());
        assert_eq!(gateway.connection_count(), 0);
        assert_eq!(gateway.bound_connection_count(), 0);
        assert!(!gateway.send(&id, pong()));
    }
}
