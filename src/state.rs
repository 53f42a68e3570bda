use std::sync::Arc;

use crate::config::Config;
use crate::db::{PlaybackWriter, RoomStore};
use crate::room::RoomRegistry;
use crate::websocket::ConnectionGateway;

/// Shared state handed to every HTTP and WebSocket handler
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RoomStore>,
    pub gateway: Arc<ConnectionGateway>,
    pub writer: PlaybackWriter,
    pub registry: Arc<RoomRegistry>,
}

impl AppState {
    /// Wire up the sync engine on top of a store. Must run inside a Tokio runtime.
    pub fn new(config: Config, store: Arc<dyn RoomStore>) -> Self {
        let gateway = Arc::new(ConnectionGateway::new());
        let writer = PlaybackWriter::spawn(store.clone());
        let registry = Arc::new(RoomRegistry::new(
            store.clone(),
            gateway.clone(),
            writer.clone(),
            config.room_settings(),
        ));
        Self {
            config,
            store,
            gateway,
            writer,
            registry,
        }
    }
}
