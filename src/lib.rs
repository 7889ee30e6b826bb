//! In-process core for a photo-critique client: sends an uploaded photo to
//! a multimodal model for critique, parses the structured payload embedded
//! in the response, optionally requests an improved rendering, and keeps a
//! bounded history of past runs.
//!
//! Hosts construct a [`GeminiClient`](llm::GeminiClient) from a
//! [`Config`](config::Config), wrap it in a [`Studio`](studio::Studio)
//! together with a [`HistoryStore`](history::HistoryStore), and render from
//! the session snapshots the studio exposes.

pub mod analysis;
pub mod config;
pub mod history;
pub mod llm;
pub mod studio;
pub mod utils;

pub use analysis::{
    extract_analysis, AnalysisData, AnalysisMode, CompositionGuide, Extraction, Ratings, Session,
    SessionStatus, TargetMode, TechnicalSettings,
};
pub use config::Config;
pub use history::{FileSlot, HistoryItem, HistorySlot, HistoryStore, MemorySlot};
pub use llm::{GeminiClient, ImageAnalyzer, ImageImprover};
pub use llm::media::EncodedImage;
pub use studio::Studio;
