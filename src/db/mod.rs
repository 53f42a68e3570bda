pub mod store;
pub mod dbroom;
pub mod memory;
pub mod writer;

pub use store::{RoomStore, StoreError, DEFAULT_COMMENT_HISTORY_LIMIT, DEFAULT_ROOM_LIST_LIMIT};
pub use dbroom::PgRoomStore;
pub use memory::MemoryRoomStore;
pub use writer::PlaybackWriter;
