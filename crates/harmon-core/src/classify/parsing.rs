//! JSON parsing helpers for reasoning-provider responses
//!
//! Vision models are asked for strict JSON but often wrap the payload in
//! prose or markdown fences. These helpers extract the first JSON object
//! from the response text and parse it into a typed payload.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Classification payload the vision prompt asks the model to emit
#[derive(Debug, Clone, Deserialize)]
pub struct VisionPayload {
    /// Full HS code; some models answer with "hs_code" despite the prompt
    #[serde(alias = "hs_code")]
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Raw numeric-or-string value estimate; coerced later, not here
    #[serde(default)]
    pub estimated_value: Option<serde_json::Value>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Extract the first balanced-looking JSON object from model output
pub fn extract_json_object(response: &str) -> Result<&str> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok(&response[s..=e]),
        _ => Err(Error::MalformedResponse(format!(
            "No JSON found in model response | Raw: {}",
            truncate(response)
        ))),
    }
}

/// Parse the classification payload out of model prose
pub fn parse_vision_payload(response: &str) -> Result<VisionPayload> {
    let json_str = extract_json_object(response)?;
    serde_json::from_str(json_str).map_err(|e| {
        Error::MalformedResponse(format!(
            "Invalid classification JSON from model: {} | Raw: {}",
            e,
            truncate(json_str)
        ))
    })
}

/// Truncate long responses for error messages
fn truncate(s: &str) -> String {
    if s.len() > 200 {
        format!("{}...", &s[..200])
    } else {
        s.to_string()
    }
}
