//! Structured-provider backend (tariff knowledge graph over GraphQL)
//!
//! The tariff graph classifies from normalized text or a resolvable image
//! URL. It cannot consume inline image bytes: a bytes-only input is answered
//! locally with an insufficient-input result instead of a doomed network
//! call, and the orchestrator is expected to substitute text fields from
//! the reasoning provider first.
//!
//! # Configuration
//!
//! Environment variables:
//! - `HARMON_TARIFF_HOST`: GraphQL endpoint base URL
//! - `HARMON_TARIFF_API_KEY`: API key (required for live calls)

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{ClassificationInput, ClassificationResult, ProviderId};

use super::ClassifierBackend;

const CLASSIFY_QUERY: &str = r#"
query Classify($name: String, $description: String, $imageUrl: String) {
  classify(name: $name, description: $description, imageUrl: $imageUrl) {
    code
    description
    confidence
  }
}"#;

/// Structured classification provider
#[derive(Clone)]
pub struct TariffGraphBackend {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl TariffGraphBackend {
    /// Create a new backend
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, api_key: &str, timeout_secs: u64) -> Self {
        let mut backend = Self::new(base_url, timeout_secs);
        backend.api_key = Some(api_key.to_string());
        backend
    }

    /// Create from environment variables
    pub fn from_env(timeout_secs: u64) -> Self {
        let host = std::env::var("HARMON_TARIFF_HOST").unwrap_or_default();
        let mut backend = Self::new(&host, timeout_secs);
        backend.api_key = std::env::var("HARMON_TARIFF_API_KEY").ok();
        backend
    }

    async fn classify_inner(&self, input: &ClassificationInput) -> Result<ClassificationResult> {
        // Bytes-only input cannot be expressed in the graph query; refuse
        // before the network rather than sending an empty request.
        if !input.has_explicit_signal() {
            return Err(Error::InsufficientInput(
                "tariff graph requires an image URL or product text; inline image bytes are not supported"
                    .into(),
            ));
        }

        let variables = json!({
            "name": input.product_name,
            "description": input.product_description,
            "imageUrl": input.image_url,
        });

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::MissingCredential("HARMON_TARIFF_API_KEY is not set".into()))?;

        let response = self
            .http_client
            .post(format!("{}/graphql", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&json!({ "query": CLASSIFY_QUERY, "variables": variables }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::MalformedResponse(format!(
                "Tariff graph error {}: {}",
                status, body
            )));
        }

        let graph_response: GraphResponse = response.json().await?;
        debug!(?graph_response, "Tariff graph response");

        if let Some(errors) = graph_response.errors {
            if !errors.is_empty() {
                let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
                return Err(Error::MalformedResponse(format!(
                    "Tariff graph returned errors: {}",
                    messages.join("; ")
                )));
            }
        }

        let classification = graph_response
            .data
            .and_then(|d| d.classify)
            .ok_or_else(|| Error::MalformedResponse("Tariff graph returned no classification".into()))?;

        let raw = serde_json::to_value(&classification).unwrap_or(serde_json::Value::Null);
        Ok(ClassificationResult::classified(
            ProviderId::Structured,
            &classification.code,
            classification.description.as_deref().unwrap_or_default(),
            classification.confidence.unwrap_or(0.5),
        )
        .with_raw_response(raw))
    }
}

#[async_trait]
impl ClassifierBackend for TariffGraphBackend {
    async fn classify(&self, input: &ClassificationInput) -> ClassificationResult {
        if self.base_url.is_empty() {
            let error = Error::MissingCredential("HARMON_TARIFF_HOST is not set".into());
            return ClassificationResult::failed(ProviderId::Structured, error.to_string());
        }

        let started = Instant::now();
        let mut result = match self.classify_inner(input).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, host = %self.base_url, "Tariff graph classification failed");
                ClassificationResult::failed(ProviderId::Structured, e.to_string())
            }
        };
        result.latency_ms = started.elapsed().as_millis() as u64;
        result
    }

    async fn health_check(&self) -> bool {
        if self.base_url.is_empty() {
            return false;
        }
        let response = self
            .http_client
            .post(format!("{}/graphql", self.base_url))
            .json(&json!({ "query": "{ __typename }" }))
            .send()
            .await;
        match response {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn provider(&self) -> ProviderId {
        ProviderId::Structured
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

/// GraphQL response envelope
#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<GraphData>,
    errors: Option<Vec<GraphError>>,
}

#[derive(Debug, Deserialize)]
struct GraphData {
    classify: Option<GraphClassification>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GraphClassification {
    code: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bytes_only_input_is_refused_locally() {
        let backend = TariffGraphBackend::with_api_key("http://127.0.0.1:9", "key", 1);
        let input = ClassificationInput {
            image_data: Some(vec![1, 2, 3]),
            image_url: None,
            product_name: None,
            product_description: None,
            origin_country: None,
            destination_country: "DE".to_string(),
        };
        let result = backend.classify(&input).await;
        assert!(result.error.as_deref().unwrap().contains("image URL or product text"));
    }

    #[tokio::test]
    async fn missing_api_key_yields_credential_error() {
        let backend = TariffGraphBackend::new("http://127.0.0.1:9", 1);
        let input = ClassificationInput {
            image_data: None,
            image_url: None,
            product_name: Some("handbag".to_string()),
            product_description: None,
            origin_country: None,
            destination_country: "DE".to_string(),
        };
        let result = backend.classify(&input).await;
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .contains("HARMON_TARIFF_API_KEY"));
    }
}
