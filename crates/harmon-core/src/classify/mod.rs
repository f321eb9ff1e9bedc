//! Pluggable classification provider abstraction
//!
//! One adapter per backend, all behind a uniform async contract. Adapters
//! hide transport and auth details and **never let an error escape**: a
//! failed call comes back as a `ClassificationResult` with a populated
//! `error` field and zero confidence, so the orchestrator always completes.
//!
//! # Architecture
//!
//! - `ClassifierBackend` trait: the uniform call surface
//! - `ClassifierClient` enum: concrete wrapper providing Clone + compile-time
//!   dispatch
//! - Backend implementations: `VisionLlmBackend` (reasoning archetype),
//!   `TariffGraphBackend` (structured archetype), `MockClassifier`
//!
//! # Configuration
//!
//! Environment variables:
//! - `HARMON_VISION_HOST`: OpenAI-compatible server URL for the reasoning provider
//! - `HARMON_VISION_MODEL`: Model name (default: gpt-4o-mini)
//! - `HARMON_VISION_API_KEY`: API key if the server requires one (optional)
//! - `HARMON_TARIFF_HOST`: Tariff graph GraphQL endpoint
//! - `HARMON_TARIFF_API_KEY`: Tariff graph API key (required for calls)

mod mock;
pub mod parsing;
mod tariff_graph;
mod vision_llm;

pub use mock::MockClassifier;
pub use tariff_graph::TariffGraphBackend;
pub use vision_llm::VisionLlmBackend;

use async_trait::async_trait;

use crate::models::{ClassificationInput, ClassificationResult, ProviderId};

/// Uniform contract for classification providers
///
/// `classify` is infallible by signature: adapters convert every transport,
/// credential, or payload problem into an error-carrying result.
#[async_trait]
pub trait ClassifierBackend: Send + Sync {
    /// Classify a product; bounded by the adapter's own timeout
    async fn classify(&self, input: &ClassificationInput) -> ClassificationResult;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Which provider slot this backend fills
    fn provider(&self) -> ProviderId;

    /// Host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete classifier client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum ClassifierClient {
    /// Reasoning provider: OpenAI-compatible chat completions with vision
    VisionLlm(VisionLlmBackend),
    /// Structured provider: tariff knowledge graph behind GraphQL
    TariffGraph(TariffGraphBackend),
    /// Mock backend for testing
    Mock(MockClassifier),
}

impl ClassifierClient {
    /// Build the reasoning-provider client from environment variables
    ///
    /// An unset `HARMON_VISION_HOST` yields an unconfigured backend whose
    /// calls return a missing-credential result immediately, at zero cost.
    pub fn reasoning_from_env(timeout_secs: u64) -> Self {
        ClassifierClient::VisionLlm(VisionLlmBackend::from_env(timeout_secs))
    }

    /// Build the structured-provider client from environment variables
    pub fn structured_from_env(timeout_secs: u64) -> Self {
        ClassifierClient::TariffGraph(TariffGraphBackend::from_env(timeout_secs))
    }

    /// Create a mock classifier for testing
    pub fn mock(provider: ProviderId) -> Self {
        ClassifierClient::Mock(MockClassifier::new(provider))
    }
}

#[async_trait]
impl ClassifierBackend for ClassifierClient {
    async fn classify(&self, input: &ClassificationInput) -> ClassificationResult {
        match self {
            ClassifierClient::VisionLlm(b) => b.classify(input).await,
            ClassifierClient::TariffGraph(b) => b.classify(input).await,
            ClassifierClient::Mock(b) => b.classify(input).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            ClassifierClient::VisionLlm(b) => b.health_check().await,
            ClassifierClient::TariffGraph(b) => b.health_check().await,
            ClassifierClient::Mock(b) => b.health_check().await,
        }
    }

    fn provider(&self) -> ProviderId {
        match self {
            ClassifierClient::VisionLlm(b) => b.provider(),
            ClassifierClient::TariffGraph(b) => b.provider(),
            ClassifierClient::Mock(b) => b.provider(),
        }
    }

    fn host(&self) -> &str {
        match self {
            ClassifierClient::VisionLlm(b) => b.host(),
            ClassifierClient::TariffGraph(b) => b.host(),
            ClassifierClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassificationInput;

    fn text_input(name: &str) -> ClassificationInput {
        ClassificationInput {
            image_data: None,
            image_url: None,
            product_name: Some(name.to_string()),
            product_description: None,
            origin_country: None,
            destination_country: "DE".to_string(),
        }
    }

    #[tokio::test]
    async fn mock_client_classifies() {
        let client = ClassifierClient::mock(ProviderId::Reasoning);
        let result = client.classify(&text_input("leather handbag")).await;
        assert_eq!(result.provider, ProviderId::Reasoning);
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn mock_client_is_healthy() {
        let client = ClassifierClient::mock(ProviderId::Structured);
        assert!(client.health_check().await);
    }
}
