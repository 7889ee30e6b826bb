use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::analysis::types::AnalysisMode;
use crate::config::{
    Config, ANALYZE_PROMPT_AUTO, ANALYZE_PROMPT_CRITIQUE, ANALYZE_PROMPT_MASTERPIECE,
    EMPTY_DERIVED_PROMPT_FALLBACK, FAILED_DERIVATION_FALLBACK, GENERATION_INSTRUCTION_PREFIX,
    LENS_MASTER_SYSTEM_INSTRUCTION, NO_ANALYSIS_FALLBACK, PROMPT_DERIVATION_TEMPLATE,
};
use crate::llm::media::EncodedImage;
use crate::llm::{ImageAnalyzer, ImageImprover};
use crate::utils::timing::log_model_timing;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, thiserror::Error)]
#[error("Image generation failed: {0}")]
pub struct ImageGenerationError(pub String);

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn extract_text_from_response(response: GeminiResponse) -> String {
    let mut text_parts = Vec::new();
    for candidate in response.candidates.unwrap_or_default() {
        if let Some(content) = candidate.content {
            if let Some(parts) = content.parts {
                for part in parts {
                    if let GeminiPart::Text { text } = part {
                        if !text.trim().is_empty() {
                            text_parts.push(text);
                        }
                    }
                }
            }
        }
    }
    text_parts.join("\n")
}

fn first_image_from_response(response: GeminiResponse) -> Option<EncodedImage> {
    for candidate in response.candidates.unwrap_or_default() {
        if let Some(content) = candidate.content {
            if let Some(parts) = content.parts {
                for part in parts {
                    if let GeminiPart::InlineData { inline_data } = part {
                        if inline_data.mime_type.starts_with("image/") {
                            return Some(EncodedImage::new(
                                inline_data.mime_type,
                                inline_data.data,
                            ));
                        }
                    }
                }
            }
        }
    }
    None
}

fn image_part(image: &EncodedImage) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type(),
            "data": image.base64_data()
        }
    })
}

fn analyze_prompt(mode: AnalysisMode) -> &'static str {
    match mode {
        AnalysisMode::Auto => ANALYZE_PROMPT_AUTO,
        AnalysisMode::Masterpiece => ANALYZE_PROMPT_MASTERPIECE,
        AnalysisMode::Critique => ANALYZE_PROMPT_CRITIQUE,
    }
}

/// Gemini-backed implementation of both remote collaborators, speaking the
/// `generateContent` REST API. Built from an explicit [`Config`]; there is
/// no process-global client state.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    image_model: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(GeminiClient {
            http,
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            image_model: config.gemini_image_model.clone(),
            temperature: config.gemini_temperature,
        })
    }

    fn redact_api_key(&self, text: &str) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    async fn call_generate_content(&self, model: &str, payload: Value) -> Result<GeminiResponse> {
        let url = format!("{GEMINI_BASE_URL}/{}:generateContent?key={}", model, self.api_key);

        let response = match self.http.post(&url).json(&payload).send().await {
            Ok(response) => response,
            Err(err) => {
                let err_text = self.redact_api_key(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect()
                );
                return Err(anyhow!("Gemini request failed: {}", err_text));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = self.redact_api_key(&message.unwrap_or(body_summary));
            return Err(anyhow!(
                "Gemini request failed with status {}: {}",
                status,
                detail
            ));
        }

        Ok(response.json::<GeminiResponse>().await?)
    }

    /// Phase 1 of the improvement branch: have the model write a generation
    /// prompt from the critique. Failures and empty output both fall back to
    /// the generic prompts the contract specifies.
    async fn derive_generation_prompt(&self, image: &EncodedImage, critique: &str) -> String {
        let instruction = PROMPT_DERIVATION_TEMPLATE.replace("{critique}", critique);
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [image_part(image), { "text": instruction }]
            }]
        });

        let result = log_model_timing("gemini", &self.model, "derive_generation_prompt", None, || async {
            self.call_generate_content(&self.model, payload).await
        })
        .await;

        match result {
            Ok(response) => {
                let prompt = extract_text_from_response(response);
                if prompt.trim().is_empty() {
                    EMPTY_DERIVED_PROMPT_FALLBACK.to_string()
                } else {
                    prompt
                }
            }
            Err(err) => {
                warn!(
                    "Failed to derive a generation prompt, falling back to generic: {err:#}"
                );
                FAILED_DERIVATION_FALLBACK.to_string()
            }
        }
    }

    /// Phase 2: request the improved rendering, referencing the original
    /// image for subject continuity.
    async fn generate_from_prompt(
        &self,
        image: &EncodedImage,
        prompt: &str,
    ) -> Result<Option<EncodedImage>, ImageGenerationError> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    image_part(image),
                    { "text": format!("{GENERATION_INSTRUCTION_PREFIX}{prompt}") }
                ]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"]
            }
        });

        let response = log_model_timing(
            "gemini",
            &self.image_model,
            "generate_improved_image",
            None,
            || async { self.call_generate_content(&self.image_model, payload).await },
        )
        .await
        .map_err(|err| ImageGenerationError(err.to_string()))?;

        Ok(first_image_from_response(response))
    }
}

#[async_trait]
impl ImageAnalyzer for GeminiClient {
    async fn analyze(&self, image: &EncodedImage, mode: AnalysisMode) -> Result<String> {
        let payload = json!({
            "systemInstruction": { "parts": [{ "text": LENS_MASTER_SYSTEM_INSTRUCTION }] },
            "contents": [{
                "role": "user",
                "parts": [image_part(image), { "text": analyze_prompt(mode) }]
            }],
            "generationConfig": {
                "temperature": self.temperature
            }
        });

        let response = log_model_timing("gemini", &self.model, "analyze_image", None, || async {
            self.call_generate_content(&self.model, payload).await
        })
        .await?;

        let text = extract_text_from_response(response);
        if text.trim().is_empty() {
            debug!("Gemini returned no text parts for analysis");
            return Ok(NO_ANALYSIS_FALLBACK.to_string());
        }
        Ok(text)
    }
}

#[async_trait]
impl ImageImprover for GeminiClient {
    /// The two-phase shape is contractual: derive a generation prompt from
    /// the critique, then synthesize an image referencing the original.
    /// Hard failures in phase 2 degrade to "no image produced" because the
    /// textual analysis is still valuable on its own.
    async fn generate_improved(
        &self,
        image: &EncodedImage,
        critique: &str,
    ) -> Result<Option<EncodedImage>> {
        let prompt = self.derive_generation_prompt(image, critique).await;
        match self.generate_from_prompt(image, &prompt).await {
            Ok(improved) => Ok(improved),
            Err(err) => {
                warn!("{err}");
                Ok(None)
            }
        }
    }
}
