use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analysis::session::{Session, SessionStatus};
use crate::analysis::types::{AnalysisData, AnalysisMode};
use crate::history::slot::HistorySlot;
use crate::llm::media::EncodedImage;

pub const HISTORY_KEY: &str = "lensmaster_history_v1";
pub const MAX_HISTORY: usize = 5;

const PREVIEW_CHARS: usize = 60;

/// Immutable snapshot of one completed analysis run. Field names serialize
/// in camelCase to stay compatible with the persisted blob of the original
/// client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub timestamp: i64,
    pub original_image: EncodedImage,
    pub analysis_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improved_image: Option<EncodedImage>,
    pub mode: AnalysisMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_data: Option<AnalysisData>,
}

impl HistoryItem {
    /// `id` is the creation epoch-milliseconds as a string; uniqueness
    /// within one client is assumed, as the original did.
    pub fn new(
        original_image: EncodedImage,
        analysis_text: String,
        improved_image: Option<EncodedImage>,
        mode: AnalysisMode,
        analysis_data: Option<AnalysisData>,
    ) -> Self {
        let timestamp = Utc::now().timestamp_millis();
        HistoryItem {
            id: timestamp.to_string(),
            timestamp,
            original_image,
            analysis_text,
            improved_image,
            mode,
            analysis_data,
        }
    }

    /// Plain-text snippet for list display: markdown control characters
    /// removed, first 60 characters.
    pub fn preview(&self) -> String {
        self.analysis_text
            .chars()
            .filter(|ch| !matches!(ch, '#' | '*' | '[' | ']'))
            .take(PREVIEW_CHARS)
            .collect()
    }

    /// Reconstructs a terminal, complete session for re-display. No remote
    /// collaborator is invoked.
    pub fn restore(&self) -> Session {
        Session {
            status: SessionStatus::Complete,
            original_image: Some(self.original_image.clone()),
            analysis_text: self.analysis_text.clone(),
            improved_image: self.improved_image.clone(),
            error: None,
        }
    }
}

/// Bounded, newest-first log of analysis runs. The in-memory sequence is
/// authoritative; the slot is written best-effort after every change.
pub struct HistoryStore {
    items: Vec<HistoryItem>,
    slot: Arc<dyn HistorySlot>,
}

impl HistoryStore {
    /// Loads the persisted sequence, tolerating a missing or corrupt blob
    /// by starting empty.
    pub fn load(slot: Arc<dyn HistorySlot>) -> Self {
        let items = match slot.get(HISTORY_KEY) {
            Some(blob) => match serde_json::from_str::<Vec<HistoryItem>>(&blob) {
                Ok(items) => items,
                Err(err) => {
                    warn!("Failed to decode persisted history, starting empty: {err}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        HistoryStore { items, slot }
    }

    /// Prepends the item, truncates to capacity, and persists. Write
    /// failures are swallowed.
    pub fn record(&mut self, item: HistoryItem) {
        self.items.insert(0, item);
        self.items.truncate(MAX_HISTORY);
        self.persist();
    }

    fn persist(&self) {
        let blob = match serde_json::to_string(&self.items) {
            Ok(blob) => blob,
            Err(err) => {
                warn!("Failed to serialize history: {err}");
                return;
            }
        };
        if let Err(err) = self.slot.set(HISTORY_KEY, &blob) {
            warn!("Failed to persist history, in-memory state remains authoritative: {err:#}");
        }
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&HistoryItem> {
        self.items.iter().find(|item| item.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::slot::MemorySlot;
    use anyhow::anyhow;

    struct FailingSlot;

    impl HistorySlot for FailingSlot {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, _key: &str, _blob: &str) -> anyhow::Result<()> {
            Err(anyhow!("quota exceeded"))
        }
    }

    fn item(text: &str) -> HistoryItem {
        HistoryItem {
            id: text.to_string(),
            timestamp: 0,
            original_image: EncodedImage::from_base64("aW1n".to_string()),
            analysis_text: text.to_string(),
            improved_image: None,
            mode: AnalysisMode::Auto,
            analysis_data: None,
        }
    }

    #[test]
    fn capacity_is_bounded_newest_first() {
        let mut store = HistoryStore::load(Arc::new(MemorySlot::new()));
        for index in 0..6 {
            store.record(item(&format!("run-{index}")));
        }
        assert_eq!(store.len(), MAX_HISTORY);
        assert_eq!(store.items()[0].analysis_text, "run-5");
        assert_eq!(store.items()[4].analysis_text, "run-1");
        assert!(store.get("run-0").is_none());
    }

    #[test]
    fn missing_blob_loads_empty() {
        let store = HistoryStore::load(Arc::new(MemorySlot::new()));
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_blob_loads_empty() {
        let slot = Arc::new(MemorySlot::new());
        slot.set(HISTORY_KEY, "{definitely not json").unwrap();
        let store = HistoryStore::load(slot);
        assert!(store.is_empty());
    }

    #[test]
    fn write_failure_keeps_memory_authoritative() {
        let mut store = HistoryStore::load(Arc::new(FailingSlot));
        store.record(item("survives"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].analysis_text, "survives");
    }

    #[test]
    fn persisted_blob_round_trips_through_slot() {
        let slot = Arc::new(MemorySlot::new());
        {
            let mut store = HistoryStore::load(slot.clone());
            store.record(item("persisted"));
        }
        let reloaded = HistoryStore::load(slot);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.items()[0].analysis_text, "persisted");
    }

    #[test]
    fn persisted_shape_uses_camel_case_fields() {
        let snapshot = HistoryItem::new(
            EncodedImage::from_base64("aW1n".to_string()),
            "text".to_string(),
            Some(EncodedImage::from_base64("aW1w".to_string())),
            AnalysisMode::Critique,
            None,
        );
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("originalImage").is_some());
        assert!(value.get("analysisText").is_some());
        assert!(value.get("improvedImage").is_some());
        assert_eq!(value.get("mode").unwrap(), "critique");
        assert!(value.get("analysisData").is_none());
    }

    #[test]
    fn preview_strips_markdown_and_truncates_on_char_boundaries() {
        let mut snapshot = item("## 构图分析\n**主体**突出 [很好]");
        assert_eq!(snapshot.preview(), " 构图分析\n主体突出 很好");

        snapshot.analysis_text = "构".repeat(100);
        assert_eq!(snapshot.preview().chars().count(), 60);
    }

    #[test]
    fn restore_rebuilds_a_complete_session() {
        let snapshot = item("analysis");
        let session = snapshot.restore();
        assert_eq!(session.status, SessionStatus::Complete);
        assert_eq!(session.analysis_text, "analysis");
        assert!(session.original_image.is_some());
        assert!(session.error.is_none());
    }
}
