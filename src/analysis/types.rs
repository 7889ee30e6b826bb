use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Analysis mode selected by the user before a run. Captured at run start and
/// held constant for the duration of that run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Auto,
    Masterpiece,
    Critique,
}

/// The model's own classification of the photo, read from the structured
/// payload. Comparison is case-sensitive: anything other than the exact
/// strings `"masterpiece"` / `"critique"` decodes to absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    Masterpiece,
    Critique,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutter_speed: Option<String>,
}

/// Scores the model assigns, each expected in [0,100] but deliberately not
/// range-enforced here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composition: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lighting: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creativity: Option<i64>,
}

/// An overlay descriptor drawn over the original image. Coordinates are
/// percentages of the image dimensions (0-100, not clamped).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CompositionGuide {
    Line {
        #[serde(skip_serializing_if = "Option::is_none")]
        x1: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        y1: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        x2: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        y2: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
    Rect {
        #[serde(skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        w: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        h: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
}

/// The structured payload the model embeds at the end of its free-text
/// response. Every field is optional and decoded independently: a malformed
/// field becomes `None` without poisoning its siblings, so consumers must
/// treat the whole bundle as best-effort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_settings: Option<TechnicalSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratings: Option<Ratings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_palette: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composition_guides: Option<Vec<CompositionGuide>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_target_mode: Option<TargetMode>,
}

fn string_field(object: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(|value| value.as_str())
        .map(|value| value.to_string())
}

fn integer_field(object: &serde_json::Map<String, Value>, key: &str) -> Option<i64> {
    object.get(key).and_then(|value| value.as_i64())
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| item.as_str().map(|s| s.to_string()))
            .collect(),
    )
}

impl AnalysisData {
    /// Decodes a JSON value field by field. A non-object value is not the
    /// structured format at all and yields `None`; inside an object, each
    /// field that fails to decode is dropped individually.
    pub fn from_value(value: &Value) -> Option<AnalysisData> {
        let object = value.as_object()?;

        let technical_settings = object
            .get("technical_settings")
            .and_then(|value| value.as_object())
            .map(|settings| TechnicalSettings {
                iso: string_field(settings, "iso"),
                aperture: string_field(settings, "aperture"),
                shutter_speed: string_field(settings, "shutter_speed"),
            });

        let ratings = object
            .get("ratings")
            .and_then(|value| value.as_object())
            .map(|ratings| Ratings {
                composition: integer_field(ratings, "composition"),
                lighting: integer_field(ratings, "lighting"),
                creativity: integer_field(ratings, "creativity"),
            });

        let keywords = object.get("keywords").and_then(string_list);
        let color_palette = object.get("color_palette").and_then(string_list);

        let composition_guides = object
            .get("composition_guides")
            .and_then(|value| value.as_array())
            .map(|guides| {
                guides
                    .iter()
                    .filter_map(|guide| {
                        serde_json::from_value::<CompositionGuide>(guide.clone()).ok()
                    })
                    .collect::<Vec<_>>()
            });

        let analysis_target_mode = object
            .get("analysis_target_mode")
            .and_then(|value| value.as_str())
            .and_then(|tag| match tag {
                "masterpiece" => Some(TargetMode::Masterpiece),
                "critique" => Some(TargetMode::Critique),
                _ => None,
            });

        Some(AnalysisData {
            technical_settings,
            ratings,
            keywords,
            color_palette,
            composition_guides,
            analysis_target_mode,
        })
    }
}
