use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::db::store::RoomStore;
use crate::models::PlaybackState;

/// A playback state snapshot to persist
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackWrite {
    pub room_id: String,
    pub state: PlaybackState,
}

enum WriterCommand {
    Write(PlaybackWrite),
    Flush(oneshot::Sender<()>),
}

/// Best-effort persistence of playback state.
///
/// Writes are queued without waiting and applied by a single background task
/// in submission order, so a slow store never holds up a room. Failures are
/// logged and dropped; the in-memory state stays authoritative.
#[derive(Clone)]
pub struct PlaybackWriter {
    tx: mpsc::UnboundedSender<WriterCommand>,
}

impl PlaybackWriter {
    pub fn spawn(store: Arc<dyn RoomStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriterCommand>();

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    WriterCommand::Write(write) => {
                        let state = &write.state;
                        if let Err(e) = store
                            .update_video_state(&write.room_id, state.video_url.as_deref(), state.position_seconds, state.is_playing)
                            .await
                        {
                            error!("Failed to persist playback state for room {}: {}", write.room_id, e);
                        } else {
                            debug!("Persisted playback state for room {}", write.room_id);
                        }
                    }
                    WriterCommand::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Playback writer stopped");
        });

        Self { tx }
    }

    pub fn submit(&self, room_id: &str, state: &PlaybackState) {
        let write = PlaybackWrite {
            room_id: room_id.to_string(),
            state: state.clone(),
        };
        if self.tx.send(WriterCommand::Write(write)).is_err() {
            warn!("Playback writer is gone, dropping state for room {}", room_id);
        }
    }

    /// Resolves once every write submitted before the call has been applied
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriterCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}
