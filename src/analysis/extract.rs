use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::analysis::types::AnalysisData;

static FENCED_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```json\s*([\s\S]*?)\s*```|```\s*([\s\S]*?)\s*```")
        .expect("valid fenced block regex")
});

/// Result of scanning a model response for the trailing structured payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub clean_text: String,
    pub data: Option<AnalysisData>,
}

/// Locates the structured JSON payload embedded in a model response.
///
/// All fenced code blocks are scanned and the last one in document order
/// wins: models often emit explanatory snippets early and the payload last.
/// On success the matched block (fences included) is removed from the
/// returned text; on any decode failure the text comes back unchanged and
/// the payload is absent. A malformed trailing block must never block
/// display of the narrative, so decode failures are logged and swallowed.
///
/// Pure and idempotent: re-extracting `clean_text` is a no-op.
pub fn extract_analysis(text: &str) -> Extraction {
    let mut last: Option<(std::ops::Range<usize>, &str)> = None;
    for captures in FENCED_BLOCK_RE.captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let inner = captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|group| group.as_str())
            .unwrap_or_default();
        last = Some((whole.range(), inner));
    }

    let Some((range, inner)) = last else {
        return Extraction {
            clean_text: text.to_string(),
            data: None,
        };
    };

    let value = match serde_json::from_str::<Value>(inner) {
        Ok(value) => value,
        Err(err) => {
            warn!("Structured payload is not valid JSON: {err}");
            return Extraction {
                clean_text: text.to_string(),
                data: None,
            };
        }
    };

    match AnalysisData::from_value(&value) {
        Some(data) => {
            let clean_text = format!("{}{}", &text[..range.start], &text[range.end..])
                .trim()
                .to_string();
            Extraction {
                clean_text,
                data: Some(data),
            }
        }
        None => {
            warn!("Structured payload is not a JSON object; keeping text as-is");
            Extraction {
                clean_text: text.to_string(),
                data: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::TargetMode;

    const VALID_BLOCK: &str = "```json\n{\"analysis_target_mode\": \"critique\", \"keywords\": [\"夜景\"]}\n```";

    #[test]
    fn no_fenced_block_is_a_noop() {
        let result = extract_analysis("plain text");
        assert_eq!(result.clean_text, "plain text");
        assert!(result.data.is_none());
    }

    #[test]
    fn trailing_block_is_extracted_and_removed() {
        let text = format!("这张照片构图很好。\n\n{VALID_BLOCK}");
        let result = extract_analysis(&text);
        assert_eq!(result.clean_text, "这张照片构图很好。");
        let data = result.data.unwrap();
        assert_eq!(data.analysis_target_mode, Some(TargetMode::Critique));
        assert_eq!(data.keywords.as_ref().unwrap()[0], "夜景");
    }

    #[test]
    fn last_match_wins() {
        let text = format!(
            "Settings hint:\n```\niso 400, f/2.8\n```\nFinal payload:\n{VALID_BLOCK}"
        );
        let result = extract_analysis(&text);
        assert!(result.data.is_some());
        // The earlier fenced snippet survives in the cleaned text.
        assert!(result.clean_text.contains("iso 400, f/2.8"));
        assert!(!result.clean_text.contains("analysis_target_mode"));
    }

    #[test]
    fn malformed_trailing_block_keeps_text_unchanged() {
        let text = "analysis body\n```json\n{not valid json\n```";
        let result = extract_analysis(text);
        assert_eq!(result.clean_text, text);
        assert!(result.data.is_none());
    }

    #[test]
    fn non_object_payload_keeps_text_unchanged() {
        let text = "analysis body\n```json\n[1, 2, 3]\n```";
        let result = extract_analysis(text);
        assert_eq!(result.clean_text, text);
        assert!(result.data.is_none());
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = format!("narrative\n\n{VALID_BLOCK}");
        let first = extract_analysis(&text);
        let second = extract_analysis(&first.clean_text);
        assert_eq!(second.clean_text, first.clean_text);
        assert!(second.data.is_none());
    }

    #[test]
    fn bare_fence_without_language_tag_is_accepted() {
        let text = "body\n```\n{\"analysis_target_mode\": \"masterpiece\"}\n```";
        let result = extract_analysis(text);
        assert_eq!(
            result.data.unwrap().analysis_target_mode,
            Some(TargetMode::Masterpiece)
        );
        assert_eq!(result.clean_text, "body");
    }
}
