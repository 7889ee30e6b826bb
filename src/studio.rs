use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::analysis::extract::extract_analysis;
use crate::analysis::session::Session;
use crate::analysis::types::{AnalysisData, AnalysisMode, TargetMode};
use crate::history::store::{HistoryItem, HistoryStore};
use crate::llm::media::EncodedImage;
use crate::llm::{ImageAnalyzer, ImageImprover};

/// Shown when the analyze call fails without a usable message.
const GENERIC_ERROR_MESSAGE: &str = "Something went wrong.";

/// Literal substring the model emits when it chose its critique workflow;
/// the automatic mode falls back to sniffing for it when the structured
/// payload is missing or malformed.
const CRITIQUE_MARKER: &str = "Mode 2";

/// Decides whether the improvement branch fires. An explicit user choice
/// always wins, a well-formed model classification is honored, and in
/// automatic mode a textual heuristic covers malformed payloads.
fn should_improve(mode: AnalysisMode, data: Option<&AnalysisData>, raw_text: &str) -> bool {
    mode == AnalysisMode::Critique
        || data.is_some_and(|data| data.analysis_target_mode == Some(TargetMode::Critique))
        || (mode == AnalysisMode::Auto && raw_text.contains(CRITIQUE_MARKER))
}

struct StudioInner {
    session: Session,
    mode: AnalysisMode,
    history: HistoryStore,
    // Memoized derived structure, keyed on the exact analysis text.
    derived: Option<(String, Option<AnalysisData>)>,
}

/// Orchestrating facade a host application embeds: owns the current
/// session, the selected mode, and the history store, and drives the
/// two-step remote sequence of a run.
///
/// Every session mutation from an in-flight run goes through a monotonic
/// run-epoch check, so a stale response resolving after the session was
/// reset (or replaced by a newer run) can never overwrite the newer state.
/// The stale run's remote calls are not cancelled, only their effects
/// discarded; its analyze result is still recorded to history.
pub struct Studio {
    analyzer: Arc<dyn ImageAnalyzer>,
    improver: Arc<dyn ImageImprover>,
    epoch: AtomicU64,
    inner: Mutex<StudioInner>,
}

impl Studio {
    pub fn new(
        analyzer: Arc<dyn ImageAnalyzer>,
        improver: Arc<dyn ImageImprover>,
        history: HistoryStore,
    ) -> Self {
        Studio {
            analyzer,
            improver,
            epoch: AtomicU64::new(0),
            inner: Mutex::new(StudioInner {
                session: Session::new(),
                mode: AnalysisMode::Auto,
                history,
                derived: None,
            }),
        }
    }

    /// Replaces the session with a fresh one holding the image. Supersedes
    /// any in-flight run.
    pub fn select_image(&self, image: EncodedImage) {
        let mut inner = self.inner.lock();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        inner.session = Session::with_image(image);
    }

    pub fn set_mode(&self, mode: AnalysisMode) {
        self.inner.lock().mode = mode;
    }

    pub fn mode(&self) -> AnalysisMode {
        self.inner.lock().mode
    }

    /// Snapshot of the current session. Hosts poll this while a run is in
    /// flight.
    pub fn session(&self) -> Session {
        self.inner.lock().session.clone()
    }

    /// Derived structure of the current session's text, memoized on the
    /// exact text so repeated renders do not re-run the extractor.
    pub fn analysis_data(&self) -> Option<AnalysisData> {
        let mut inner = self.inner.lock();
        let text = inner.session.analysis_text.clone();
        if text.is_empty() {
            return None;
        }
        if let Some((cached_text, cached)) = &inner.derived {
            if *cached_text == text {
                return cached.clone();
            }
        }
        let data = extract_analysis(&text).data;
        inner.derived = Some((text, data.clone()));
        data
    }

    /// Newest-first snapshot of recorded runs.
    pub fn history(&self) -> Vec<HistoryItem> {
        self.inner.lock().history.items().to_vec()
    }

    /// Restores a past run for re-display, including its mode. No remote
    /// collaborator is invoked. Supersedes any in-flight run.
    pub fn select_history(&self, item: &HistoryItem) {
        let mut inner = self.inner.lock();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        inner.session = item.restore();
        inner.mode = item.mode;
    }

    /// Clears the session back to idle. Supersedes any in-flight run.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        inner.session = Session::new();
    }

    pub fn dismiss_error(&self) {
        self.inner.lock().session.dismiss_error();
    }

    fn apply_if_current(&self, run_epoch: u64, update: impl FnOnce(&mut Session)) -> bool {
        let mut inner = self.inner.lock();
        if self.epoch.load(Ordering::SeqCst) != run_epoch {
            return false;
        }
        update(&mut inner.session);
        true
    }

    /// Runs one full analysis: the critique call, the branch decision, the
    /// optional improvement call, and the history record. Returns the
    /// session as of completion.
    ///
    /// Only the analyze call failing surfaces as an `Error` session; a
    /// failed or empty improvement degrades to "no image produced" because
    /// the textual analysis is still worth showing. A run that got its
    /// analysis text always records exactly one history entry.
    pub async fn run_analysis(&self) -> Session {
        let (image, mode, run_epoch) = {
            let mut inner = self.inner.lock();
            let Some(image) = inner.session.original_image.clone() else {
                // Caller error, not a session error.
                return inner.session.clone();
            };
            let run_epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            inner.session.begin_analysis();
            (image, inner.mode, run_epoch)
        };

        let raw = match self.analyzer.analyze(&image, mode).await {
            Ok(raw) => raw,
            Err(err) => {
                let message = err.to_string();
                let message = if message.trim().is_empty() {
                    GENERIC_ERROR_MESSAGE.to_string()
                } else {
                    message
                };
                warn!("Analyze call failed: {message}");
                self.apply_if_current(run_epoch, |session| session.fail(message));
                return self.session();
            }
        };

        // The decoded structure drives the branch decision and the history
        // snapshot; the session keeps the raw text, block included.
        let data = extract_analysis(&raw).data;
        let current =
            self.apply_if_current(run_epoch, |session| session.complete_with_text(raw.clone()));
        if !current {
            debug!("Run superseded during analyze; discarding session update");
        }

        let mut improved = None;
        if should_improve(mode, data.as_ref(), &raw) && current {
            self.apply_if_current(run_epoch, |session| session.begin_image_generation());
            improved = match self.improver.generate_improved(&image, &raw).await {
                Ok(improved) => improved,
                Err(err) => {
                    warn!("Improved image generation failed: {err:#}");
                    None
                }
            };
            self.apply_if_current(run_epoch, |session| {
                session.finish_image_generation(improved.clone())
            });
        }

        let item = HistoryItem::new(image, raw, improved, mode, data);
        self.inner.lock().history.record(item);
        self.session()
    }
}
