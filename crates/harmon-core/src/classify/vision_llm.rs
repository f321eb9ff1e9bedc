//! Reasoning-provider backend (OpenAI-compatible chat completions)
//!
//! Works with any server that implements the OpenAI chat completions API
//! and a vision-capable model. The prompt asks for strict JSON carrying the
//! HS code, a product description, a confidence, and a retail-value
//! estimate; the response is parsed tolerantly because models wrap JSON in
//! prose more often than not.
//!
//! # Configuration
//!
//! Environment variables:
//! - `HARMON_VISION_HOST`: Server URL (required for live calls)
//! - `HARMON_VISION_MODEL`: Model name (default: gpt-4o-mini)
//! - `HARMON_VISION_API_KEY`: API key if required (optional)

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{ClassificationInput, ClassificationResult, ProviderId};

use super::parsing::parse_vision_payload;
use super::ClassifierBackend;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Reasoning provider over the OpenAI chat completions API
///
/// Accepts arbitrary image bytes (sent as a data URL), a remote image URL,
/// and free text. Besides classification it estimates a monetary value for
/// the product, which the orchestrator may use when the request declares
/// none.
#[derive(Clone)]
pub struct VisionLlmBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl VisionLlmBackend {
    /// Create a new backend
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        Self {
            http_client: build_client(timeout_secs),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str, timeout_secs: u64) -> Self {
        let mut backend = Self::new(base_url, model, timeout_secs);
        backend.api_key = Some(api_key.to_string());
        backend
    }

    /// Create from environment variables
    ///
    /// An unset `HARMON_VISION_HOST` yields an unconfigured backend whose
    /// calls fail immediately with a missing-credential result.
    pub fn from_env(timeout_secs: u64) -> Self {
        let host = std::env::var("HARMON_VISION_HOST").unwrap_or_default();
        let model =
            std::env::var("HARMON_VISION_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let mut backend = Self::new(&host, &model, timeout_secs);
        backend.api_key = std::env::var("HARMON_VISION_API_KEY").ok();
        backend
    }

    fn classification_prompt(input: &ClassificationInput) -> String {
        let mut prompt = String::from(
            "Classify the product for customs purposes. Respond with strict JSON only, \
             using exactly these keys: \
             {\"code\": \"<full HS code, 8+ digits where possible>\", \
             \"description\": \"<short product description>\", \
             \"confidence\": <0.0-1.0>, \
             \"estimated_value\": <typical retail value as a number>, \
             \"reasoning\": \"<one sentence>\"}.",
        );
        if let Some(ref name) = input.product_name {
            prompt.push_str(&format!(" Product name: {}.", name));
        }
        if let Some(ref description) = input.product_description {
            prompt.push_str(&format!(" Product description: {}.", description));
        }
        if input.product_name.is_none() && input.product_description.is_none() {
            prompt.push_str(" Identify the product from the attached image.");
        }
        prompt
    }

    async fn classify_inner(&self, input: &ClassificationInput) -> Result<ClassificationResult> {
        let prompt = Self::classification_prompt(input);

        // Attach the image as a data URL (inline bytes) or pass the remote
        // URL straight through; text-only requests skip the image part.
        let content = match (&input.image_data, &input.image_url) {
            (Some(bytes), _) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                ChatContent::Parts(vec![
                    ContentPart::Text { text: prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/jpeg;base64,{}", encoded),
                        },
                    },
                ])
            }
            (None, Some(url)) => ChatContent::Parts(vec![
                ContentPart::Text { text: prompt },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: url.clone() },
                },
            ]),
            (None, None) => ChatContent::Text(prompt),
        };

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
            temperature: Some(0.1),
            max_tokens: Some(1024),
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::MalformedResponse(format!(
                "Vision API error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;
        let raw = serde_json::to_value(&chat_response).unwrap_or(serde_json::Value::Null);

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::MalformedResponse("No choices in vision response".into()))?;

        debug!(response = %content, "Vision model response");

        let payload = parse_vision_payload(&content)?;
        let mut result = ClassificationResult::classified(
            ProviderId::Reasoning,
            &payload.code,
            payload.description.as_deref().unwrap_or_default(),
            payload.confidence.unwrap_or(0.5),
        )
        .with_raw_response(raw);
        if let Some(reasoning) = payload.reasoning {
            result = result.with_reasoning(reasoning);
        }
        if let Some(value) = payload.estimated_value {
            result = result.with_estimated_value(value);
        }
        Ok(result)
    }
}

#[async_trait]
impl ClassifierBackend for VisionLlmBackend {
    async fn classify(&self, input: &ClassificationInput) -> ClassificationResult {
        if self.base_url.is_empty() {
            let error = Error::MissingCredential("HARMON_VISION_HOST is not set".into());
            return ClassificationResult::failed(ProviderId::Reasoning, error.to_string());
        }

        let started = Instant::now();
        let mut result = match self.classify_inner(input).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, host = %self.base_url, "Vision classification failed");
                ClassificationResult::failed(ProviderId::Reasoning, e.to_string())
            }
        };
        result.latency_ms = started.elapsed().as_millis() as u64;
        result
    }

    async fn health_check(&self) -> bool {
        if self.base_url.is_empty() {
            return false;
        }
        let mut req_builder = self
            .http_client
            .get(format!("{}/v1/models", self.base_url));
        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }
        match req_builder.send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn provider(&self) -> ProviderId {
        ProviderId::Reasoning
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

/// Request to the chat completions API
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: ChatContent,
}

/// Message content: plain text or multi-part (text + image)
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// Response from the chat completions API
#[derive(Debug, Serialize, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_input() -> ClassificationInput {
        ClassificationInput {
            image_data: Some(vec![0xff, 0xd8, 0xff]),
            image_url: None,
            product_name: None,
            product_description: None,
            origin_country: None,
            destination_country: "DE".to_string(),
        }
    }

    #[test]
    fn prompt_mentions_text_fields_when_present() {
        let input = ClassificationInput {
            product_name: Some("leather handbag".to_string()),
            ..bytes_input()
        };
        let prompt = VisionLlmBackend::classification_prompt(&input);
        assert!(prompt.contains("leather handbag"));
        assert!(!prompt.contains("attached image"));
    }

    #[test]
    fn prompt_falls_back_to_image_identification() {
        let prompt = VisionLlmBackend::classification_prompt(&bytes_input());
        assert!(prompt.contains("attached image"));
    }

    #[tokio::test]
    async fn unconfigured_backend_fails_without_network() {
        let backend = VisionLlmBackend::new("", DEFAULT_MODEL, 1);
        let result = backend.classify(&bytes_input()).await;
        assert!(!result.is_ok());
        assert!(result.error.as_deref().unwrap().contains("HARMON_VISION_HOST"));
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn unreachable_host_yields_error_result() {
        let backend = VisionLlmBackend::new("http://127.0.0.1:9", DEFAULT_MODEL, 1);
        let result = backend.classify(&bytes_input()).await;
        assert!(result.error.is_some());
        assert_eq!(result.confidence, 0.0);
    }
}
