//! Wire format for the Gemini `generateContent` endpoint, and extraction of
//! the nutrition payload from its replies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::NewFood;
use crate::recognition::AttemptError;

pub const RECOGNITION_PROMPT: &str = "Please analyze this food image and provide the following \
information in JSON format only: name of the food, estimated calories, estimated carbohydrates (g), \
estimated protein (g), estimated fat (g), and an appropriate serving size. Do not include any \
explanation or additional text, just return valid JSON with these fields: name, calories, carbs, \
protein, fat, servingSize. Your response should be valid JSON that can be directly parsed.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            top_k: 32,
            top_p: 1.0,
            max_output_tokens: 1024,
        }
    }
}

impl GenerateRequest {
    #[must_use]
    pub fn for_image(image_base64: String, mime_type: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: RECOGNITION_PROMPT.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: image_base64,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Best-effort MIME type from the leading magic bytes; JPEG otherwise.
#[must_use]
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

/// Remove Markdown code fences and any prose around the first JSON object.
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```JSON"))
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.trim().strip_suffix("```").unwrap_or(text).trim();
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Pull the nutrition object out of a response body. The body is either a
/// `generateContent` envelope whose first candidate carries (possibly fenced)
/// JSON text, or the structured object itself.
pub fn extract_payload(body: &str) -> Result<Value, AttemptError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| AttemptError::Malformed(format!("response body is not JSON: {e}")))?;

    let is_envelope = value
        .as_object()
        .is_some_and(|o| o.contains_key("candidates") || o.contains_key("error"));
    if !is_envelope {
        return Ok(value);
    }

    let envelope: GenerateResponse = serde_json::from_value(value)
        .map_err(|e| AttemptError::Malformed(format!("unexpected response envelope: {e}")))?;
    if let Some(err) = envelope.error {
        return Err(AttemptError::Malformed(format!(
            "inference service error: {}",
            err.message
        )));
    }

    let text = envelope
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| AttemptError::Malformed("no text in response".to_string()))?;

    serde_json::from_str(strip_code_fences(&text)).map_err(|e| {
        AttemptError::Malformed(format!("candidate text is not valid JSON: {e}"))
    })
}

/// Check the recognized object against the expected schema.
pub fn validate_payload(value: &Value) -> Result<NewFood, AttemptError> {
    let obj = value
        .as_object()
        .ok_or_else(|| AttemptError::Shape("expected a JSON object".to_string()))?;

    let text_field = |key: &str| -> Result<String, AttemptError> {
        match obj.get(key).and_then(Value::as_str).map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => Err(AttemptError::Shape(format!("`{key}` must be a non-empty string"))),
        }
    };
    let number_field = |key: &str| -> Result<f64, AttemptError> {
        match obj.get(key).and_then(Value::as_f64) {
            Some(n) if n.is_finite() && n >= 0.0 => Ok(n),
            Some(n) => Err(AttemptError::Shape(format!(
                "`{key}` must be non-negative (got {n})"
            ))),
            None => Err(AttemptError::Shape(format!("`{key}` must be a number"))),
        }
    };

    Ok(NewFood {
        name: text_field("name")?,
        calories: number_field("calories")?,
        carbs: number_field("carbs")?,
        protein: number_field("protein")?,
        fat: number_field("fat")?,
        serving_size: text_field("servingSize")?,
    })
}
