pub mod slot;
pub mod store;

pub use slot::{FileSlot, HistorySlot, MemorySlot};
pub use store::{HistoryItem, HistoryStore, HISTORY_KEY, MAX_HISTORY};
