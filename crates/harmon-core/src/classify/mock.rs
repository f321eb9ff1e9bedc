//! Mock classifier for testing
//!
//! Returns configurable responses without any network call, and records the
//! last input it was called with so tests can assert on substitution.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::models::{ClassificationInput, ClassificationResult, ProviderId};

use super::ClassifierBackend;

/// Mock classification backend
#[derive(Clone)]
pub struct MockClassifier {
    provider: ProviderId,
    code: String,
    description: String,
    confidence: f64,
    estimated_value: Option<serde_json::Value>,
    /// When set, every call returns an error-carrying result with this message
    failure: Option<String>,
    /// Whether health_check should return true
    pub healthy: bool,
    last_input: Arc<Mutex<Option<ClassificationInput>>>,
}

impl MockClassifier {
    /// Create a mock that classifies everything as leather footwear
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            code: "64039910".to_string(),
            description: "leather footwear".to_string(),
            confidence: 0.9,
            estimated_value: None,
            failure: None,
            healthy: true,
            last_input: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = code.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_estimated_value(mut self, value: serde_json::Value) -> Self {
        self.estimated_value = Some(value);
        self
    }

    /// Make every call return an error-carrying result
    pub fn failing(mut self, error: &str) -> Self {
        self.failure = Some(error.to_string());
        self
    }

    /// The input from the most recent `classify` call
    pub fn last_input(&self) -> Option<ClassificationInput> {
        self.last_input.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ClassifierBackend for MockClassifier {
    async fn classify(&self, input: &ClassificationInput) -> ClassificationResult {
        *self.last_input.lock().unwrap_or_else(|e| e.into_inner()) = Some(input.clone());

        if let Some(ref error) = self.failure {
            return ClassificationResult::failed(self.provider, error.clone()).with_latency_ms(1);
        }

        let mut result = ClassificationResult::classified(
            self.provider,
            &self.code,
            &self.description,
            self.confidence,
        )
        .with_latency_ms(1);
        if let Some(ref value) = self.estimated_value {
            result = result.with_estimated_value(value.clone());
        }
        result
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn provider(&self) -> ProviderId {
        self.provider
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
