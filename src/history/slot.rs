use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use parking_lot::Mutex;

use crate::config::Config;

/// One named key-value cell of the persistence layer, shaped after the
/// browser `Storage` interface the original client used. Reads are
/// best-effort (`None` covers both "missing" and "unreadable"); write
/// failures are reported but callers are free to ignore them.
pub trait HistorySlot: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, blob: &str) -> Result<()>;
}

/// File-backed slot: one JSON file per key under a directory. Defaults to
/// `$XDG_DATA_HOME/lensmaster`, falling back to `~/.local/share/lensmaster`.
pub struct FileSlot {
    dir: PathBuf,
}

impl FileSlot {
    pub fn new(dir: PathBuf) -> Self {
        FileSlot { dir }
    }

    pub fn default_dir() -> PathBuf {
        let base = env::var("XDG_DATA_HOME")
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = env::var("HOME").unwrap_or_else(|_| ".".into());
                PathBuf::from(home).join(".local").join("share")
            });
        base.join("lensmaster")
    }

    /// Honors `LENSMASTER_HISTORY_DIR` when the host configured one.
    pub fn from_config(config: &Config) -> Self {
        let dir = config
            .history_dir
            .clone()
            .unwrap_or_else(FileSlot::default_dir);
        FileSlot::new(dir)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Default for FileSlot {
    fn default() -> Self {
        FileSlot::new(FileSlot::default_dir())
    }
}

impl HistorySlot for FileSlot {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, blob: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), blob)?;
        Ok(())
    }
}

/// In-memory slot for tests and embedders that manage persistence
/// themselves.
#[derive(Default)]
pub struct MemorySlot {
    cells: Mutex<HashMap<String, String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        MemorySlot::default()
    }
}

impl HistorySlot for MemorySlot {
    fn get(&self, key: &str) -> Option<String> {
        self.cells.lock().get(key).cloned()
    }

    fn set(&self, key: &str, blob: &str) -> Result<()> {
        self.cells.lock().insert(key.to_string(), blob.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_slot_round_trip() {
        let slot = MemorySlot::new();
        assert!(slot.get("k").is_none());
        slot.set("k", "[1,2]").unwrap();
        assert_eq!(slot.get("k").as_deref(), Some("[1,2]"));
    }

    #[test]
    fn file_slot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let slot = FileSlot::new(dir.path().join("nested"));
        assert!(slot.get("history").is_none());
        slot.set("history", "{\"a\":1}").unwrap();
        assert_eq!(slot.get("history").as_deref(), Some("{\"a\":1}"));
    }
}
