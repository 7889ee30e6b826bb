use serde::{Deserialize, Serialize};

use crate::analysis::extract::extract_analysis;
use crate::analysis::types::AnalysisData;
use crate::llm::media::EncodedImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Analyzing,
    GeneratingImage,
    Complete,
    Error,
}

/// In-memory state of one analysis attempt. Transitions are driven only by
/// the [`Studio`](crate::studio::Studio); the session itself has no timers
/// or external triggers.
///
/// Invariants: no original image implies `Idle` with every other field at
/// its empty default; an improved image is present only when the improvement
/// branch ran to completion for this session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub status: SessionStatus,
    pub original_image: Option<EncodedImage>,
    pub analysis_text: String,
    pub improved_image: Option<EncodedImage>,
    pub error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            status: SessionStatus::Idle,
            original_image: None,
            analysis_text: String::new(),
            improved_image: None,
            error: None,
        }
    }

    /// Fresh session holding a newly selected image. Replaces any previous
    /// session wholesale.
    pub fn with_image(image: EncodedImage) -> Self {
        Session {
            original_image: Some(image),
            ..Session::new()
        }
    }

    pub fn begin_analysis(&mut self) {
        self.status = SessionStatus::Analyzing;
        self.analysis_text.clear();
        self.improved_image = None;
        self.error = None;
    }

    /// Stores the raw model response and tentatively marks the run complete.
    /// The embedded JSON block is kept in the text; it is only stripped on
    /// derived reads.
    pub fn complete_with_text(&mut self, text: String) {
        self.analysis_text = text;
        self.status = SessionStatus::Complete;
    }

    pub fn begin_image_generation(&mut self) {
        self.status = SessionStatus::GeneratingImage;
    }

    /// `None` is the valid "no image produced" outcome, not a failure.
    pub fn finish_image_generation(&mut self, improved: Option<EncodedImage>) {
        self.improved_image = improved;
        self.status = SessionStatus::Complete;
    }

    pub fn fail(&mut self, message: String) {
        self.status = SessionStatus::Error;
        self.error = Some(message);
    }

    /// Clears the error message without touching the status, matching the
    /// dismiss control of the presentation layer.
    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Recomputes the derived structure from the raw text. Pure function of
    /// `analysis_text`; callers that read this repeatedly should go through
    /// the studio's memoized accessor instead.
    pub fn analysis_data(&self) -> Option<AnalysisData> {
        if self.analysis_text.is_empty() {
            return None;
        }
        extract_analysis(&self.analysis_text).data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> EncodedImage {
        EncodedImage::from_base64("aGVsbG8=".to_string())
    }

    #[test]
    fn new_session_is_idle_and_empty() {
        let session = Session::new();
        assert_eq!(session.status, SessionStatus::Idle);
        assert!(session.original_image.is_none());
        assert!(session.analysis_text.is_empty());
        assert!(session.improved_image.is_none());
        assert!(session.error.is_none());
    }

    #[test]
    fn selecting_an_image_resets_everything_else() {
        let mut session = Session::with_image(image());
        session.begin_analysis();
        session.complete_with_text("analysis".to_string());
        session.finish_image_generation(Some(image()));

        let replaced = Session::with_image(image());
        assert_eq!(replaced.status, SessionStatus::Idle);
        assert!(replaced.analysis_text.is_empty());
        assert!(replaced.improved_image.is_none());
        assert!(session.improved_image.is_some());
    }

    #[test]
    fn begin_analysis_clears_previous_run() {
        let mut session = Session::with_image(image());
        session.complete_with_text("old run".to_string());
        session.finish_image_generation(Some(image()));
        session.fail("boom".to_string());

        session.begin_analysis();
        assert_eq!(session.status, SessionStatus::Analyzing);
        assert!(session.analysis_text.is_empty());
        assert!(session.improved_image.is_none());
        assert!(session.error.is_none());
        assert!(session.original_image.is_some());
    }

    #[test]
    fn dismiss_error_keeps_status() {
        let mut session = Session::with_image(image());
        session.fail("analyze failed".to_string());
        session.dismiss_error();
        assert_eq!(session.status, SessionStatus::Error);
        assert!(session.error.is_none());
    }

    #[test]
    fn analysis_data_is_recomputed_from_text() {
        let mut session = Session::with_image(image());
        assert!(session.analysis_data().is_none());

        session.complete_with_text(
            "body\n```json\n{\"keywords\": [\"minimal\"]}\n```".to_string(),
        );
        let data = session.analysis_data().unwrap();
        assert_eq!(data.keywords.as_ref().unwrap()[0], "minimal");
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::GeneratingImage).unwrap(),
            "\"generating_image\""
        );
    }
}
