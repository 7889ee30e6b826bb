pub mod extract;
pub mod session;
pub mod types;

pub use extract::{extract_analysis, Extraction};
pub use session::{Session, SessionStatus};
pub use types::{
    AnalysisData, AnalysisMode, CompositionGuide, Ratings, TargetMode, TechnicalSettings,
};
