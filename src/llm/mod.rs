pub mod gemini;
pub mod media;

use anyhow::Result;
use async_trait::async_trait;

use crate::analysis::types::AnalysisMode;
use crate::llm::media::EncodedImage;

pub use gemini::GeminiClient;

/// Critique collaborator: image + mode in, free-form text (with an embedded
/// structured payload, when the model cooperates) out.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, image: &EncodedImage, mode: AnalysisMode) -> Result<String>;
}

/// Improvement collaborator. `Ok(None)` means "no image produced", which is
/// a valid outcome rather than a failure.
#[async_trait]
pub trait ImageImprover: Send + Sync {
    async fn generate_improved(
        &self,
        image: &EncodedImage,
        critique: &str,
    ) -> Result<Option<EncodedImage>>;
}
