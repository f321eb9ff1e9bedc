//! Comparison orchestrator
//!
//! Sequences the provider calls for one comparison request:
//!
//! 1. reasoning classification (always before the structured call, whose
//!    input may depend on it)
//! 2. input substitution for the structured provider when the request
//!    carried only inline image bytes
//! 3. structured classification
//! 4. product-value resolution (declared value, else the reasoning
//!    provider's estimate)
//! 5. concurrent duty fan-out, one call per usable classification plus a
//!    synthetic structured-slot call when only the reasoning code survived
//! 6. analysis (matcher, scorer, summary)
//! 7. persistence
//!
//! Adapter failures stay local to their result entry; the orchestrator only
//! rejects a request for validation errors, before any provider is called.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info};
use uuid::Uuid;

use crate::classify::{ClassifierBackend, ClassifierClient};
use crate::config::AppConfig;
use crate::duty::{DutyBackend, DutyClient};
use crate::error::Result;
use crate::matcher::match_matrix;
use crate::models::{
    AggregateComparisonResult, Analysis, ClassificationInput, ClassificationResult,
    ComparisonRequest, DutyRequest, DutyResult, ProviderId,
};
use crate::scorer::{decide_winner, score_all};
use crate::store::ComparisonStore;
use crate::summary::{generate_notes, SummaryContext};

/// Derive the structured provider's input when the original lacks anything
/// it can consume
///
/// When the request carried only inline image bytes (no URL, no text), the
/// reasoning provider's identified description becomes the product name and
/// its reasoning text the description. The bytes are dropped: the structured
/// provider cannot read them, and the substituted text already stands in for
/// them. The original input is never mutated.
pub fn derive_substitute_input(
    original: &ClassificationInput,
    reasoning: Option<&ClassificationResult>,
) -> ClassificationInput {
    if original.has_explicit_signal() {
        return original.clone();
    }
    let Some(reasoning) = reasoning.filter(|r| r.is_ok() && !r.description.is_empty()) else {
        return original.clone();
    };

    let mut derived = original.clone();
    derived.image_data = None;
    derived.product_name = Some(reasoning.description.clone());
    derived.product_description = reasoning.reasoning.clone();
    derived
}

/// Coerce an AI-estimated value into a positive finite number
///
/// Accepts JSON numbers and numeric strings; rejects everything else,
/// including NaN, infinities, and non-positive amounts.
pub fn coerce_positive_value(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite() && *v > 0.0)
}

/// Resolve the product value for the duty phase
///
/// Declared positive value first, the reasoning provider's estimate second;
/// the boolean records whether the estimate won.
fn resolve_product_value(
    declared: Option<f64>,
    reasoning: Option<&ClassificationResult>,
) -> (Option<f64>, bool) {
    if let Some(value) = declared.filter(|v| v.is_finite() && *v > 0.0) {
        return (Some(value), false);
    }
    let estimated = reasoning
        .and_then(|r| r.estimated_value.as_ref())
        .and_then(coerce_positive_value);
    match estimated {
        Some(value) => (Some(value), true),
        None => (None, false),
    }
}

/// Orchestrates provider calls and assembles the aggregate result
pub struct Orchestrator {
    reasoning: ClassifierClient,
    structured: ClassifierClient,
    duty: DutyClient,
    store: Arc<dyn ComparisonStore>,
    config: AppConfig,
}

impl Orchestrator {
    pub fn new(
        reasoning: ClassifierClient,
        structured: ClassifierClient,
        duty: DutyClient,
        store: Arc<dyn ComparisonStore>,
        config: AppConfig,
    ) -> Self {
        Self {
            reasoning,
            structured,
            duty,
            store,
            config,
        }
    }

    /// Build an orchestrator with all live backends from the environment
    pub fn from_env(store: Arc<dyn ComparisonStore>, config: AppConfig) -> Self {
        let timeout = config.request_timeout_secs;
        Self::new(
            ClassifierClient::reasoning_from_env(timeout),
            ClassifierClient::structured_from_env(timeout),
            DutyClient::from_env(config.standard_vat_rate, timeout),
            store,
            config,
        )
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Backends, for health reporting
    pub fn backends(&self) -> (&ClassifierClient, &ClassifierClient, &DutyClient) {
        (&self.reasoning, &self.structured, &self.duty)
    }

    /// Run one comparison end to end
    ///
    /// Returns `Err` only for invalid requests; provider failures are
    /// captured inside the aggregate.
    pub async fn compare(&self, request: ComparisonRequest) -> Result<AggregateComparisonResult> {
        request.validate()?;
        let input = request.to_input(&self.config.default_destination)?;
        let requested = request.requested_providers();
        let currency = request
            .currency
            .as_deref()
            .map(str::to_uppercase)
            .unwrap_or_else(|| self.config.default_currency.clone());

        let mut classifications: HashMap<ProviderId, ClassificationResult> = HashMap::new();

        // Reasoning first: the structured call may need its output.
        if requested.contains(&ProviderId::Reasoning) {
            let result = self.reasoning.classify(&input).await;
            debug!(code = %result.code, error = ?result.error, "Reasoning classification");
            classifications.insert(ProviderId::Reasoning, result);
        }

        if requested.contains(&ProviderId::Structured) {
            let derived =
                derive_substitute_input(&input, classifications.get(&ProviderId::Reasoning));
            let result = self.structured.classify(&derived).await;
            debug!(code = %result.code, error = ?result.error, "Structured classification");
            classifications.insert(ProviderId::Structured, result);
        }

        let (product_value, value_estimated) = resolve_product_value(
            request.product_value,
            classifications.get(&ProviderId::Reasoning),
        );

        let mut duties: HashMap<ProviderId, DutyResult> = HashMap::new();
        if request.calculate_duty {
            if let Some(value) = product_value {
                let plan = duty_plan(&requested, &classifications);
                let calls = plan.into_iter().map(|(slot, code)| {
                    let duty_request = DutyRequest {
                        code,
                        value,
                        currency: currency.clone(),
                        origin_country: input.origin_country.clone(),
                        destination_country: input.destination_country.clone(),
                    };
                    async move { (slot, self.duty.calculate(slot, &duty_request).await) }
                });
                // A join, not a race: every call completes and files its own
                // result, failures included.
                for (slot, result) in join_all(calls).await {
                    duties.insert(slot, result);
                }
            }
        }

        let analysis = self.analyze(
            &requested,
            &classifications,
            &duties,
            &currency,
            product_value,
            value_estimated,
            request.calculate_duty,
        );

        let aggregate = AggregateComparisonResult {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            request,
            product_value,
            value_estimated,
            currency,
            classifications,
            duties,
            analysis,
        };

        self.store.insert(aggregate.clone()).await;
        info!(
            id = %aggregate.id,
            winner = ?aggregate.analysis.winner.map(|w| w.as_str()),
            "Comparison complete"
        );
        Ok(aggregate)
    }

    #[allow(clippy::too_many_arguments)]
    fn analyze(
        &self,
        requested: &[ProviderId],
        classifications: &HashMap<ProviderId, ClassificationResult>,
        duties: &HashMap<ProviderId, DutyResult>,
        currency: &str,
        product_value: Option<f64>,
        value_estimated: bool,
        duty_requested: bool,
    ) -> Analysis {
        let matches = match_matrix(requested, classifications);

        let confidence: HashMap<ProviderId, f64> = requested
            .iter()
            .filter_map(|provider| {
                classifications
                    .get(provider)
                    .map(|result| (*provider, if result.is_ok() { result.confidence } else { 0.0 }))
            })
            .collect();

        let mut duty_deltas: HashMap<String, f64> = HashMap::new();
        for (i, left) in requested.iter().enumerate() {
            for right in &requested[i + 1..] {
                let pair = (
                    duties.get(left).filter(|d| d.is_ok()),
                    duties.get(right).filter(|d| d.is_ok()),
                );
                if let (Some(a), Some(b)) = pair {
                    duty_deltas.insert(
                        format!("{}_vs_{}", left, right),
                        (a.total_landed_cost - b.total_landed_cost).abs(),
                    );
                }
            }
        }

        let scores = score_all(requested, classifications, self.config.reference_provider);
        let winner = decide_winner(&scores);

        let notes = generate_notes(
            &SummaryContext {
                requested,
                classifications,
                duties,
                matches: &matches,
                duty_deltas: &duty_deltas,
                currency,
                product_value,
                value_estimated,
                duty_requested,
            },
            &self.config,
        );

        Analysis {
            matches,
            confidence,
            duty_deltas,
            winner,
            notes,
        }
    }
}

/// Which duty calls to issue: one per usable classification, plus a
/// synthetic structured-slot call on the reasoning code when the structured
/// classification failed but the reasoning one succeeded
fn duty_plan(
    requested: &[ProviderId],
    classifications: &HashMap<ProviderId, ClassificationResult>,
) -> Vec<(ProviderId, String)> {
    let mut plan = Vec::new();
    for provider in requested {
        if let Some(result) = classifications.get(provider).filter(|r| r.is_ok()) {
            plan.push((*provider, result.code.clone()));
        }
    }

    let structured_failed = requested.contains(&ProviderId::Structured)
        && !classifications
            .get(&ProviderId::Structured)
            .map(|r| r.is_ok())
            .unwrap_or(false);
    if structured_failed {
        if let Some(reasoning) = classifications
            .get(&ProviderId::Reasoning)
            .filter(|r| r.is_ok())
        {
            plan.push((ProviderId::Structured, reasoning.code.clone()));
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::MockClassifier;
    use crate::duty::MockDutyBackend;
    use crate::models::Winner;
    use crate::store::MemoryStore;
    use base64::Engine;
    use serde_json::json;

    fn request() -> ComparisonRequest {
        ComparisonRequest {
            image_base64: None,
            image_url: None,
            product_name: Some("leather boots".to_string()),
            product_description: None,
            origin_country: Some("CN".to_string()),
            destination_country: Some("DE".to_string()),
            product_value: Some(250.0),
            currency: None,
            providers: vec![ProviderId::Reasoning, ProviderId::Structured],
            calculate_duty: true,
        }
    }

    fn orchestrator(
        reasoning: MockClassifier,
        structured: MockClassifier,
        duty: MockDutyBackend,
    ) -> Orchestrator {
        Orchestrator::new(
            ClassifierClient::Mock(reasoning),
            ClassifierClient::Mock(structured),
            DutyClient::Mock(duty),
            Arc::new(MemoryStore::new()),
            AppConfig::default(),
        )
    }

    #[test]
    fn coerce_accepts_numbers_and_numeric_strings() {
        assert_eq!(coerce_positive_value(&json!(120.5)), Some(120.5));
        assert_eq!(coerce_positive_value(&json!("120.50")), Some(120.5));
        assert_eq!(coerce_positive_value(&json!(" 80 ")), Some(80.0));
    }

    #[test]
    fn coerce_rejects_garbage() {
        assert_eq!(coerce_positive_value(&json!(-5.0)), None);
        assert_eq!(coerce_positive_value(&json!(0)), None);
        assert_eq!(coerce_positive_value(&json!("NaN")), None);
        assert_eq!(coerce_positive_value(&json!("twelve")), None);
        assert_eq!(coerce_positive_value(&json!(null)), None);
        assert_eq!(coerce_positive_value(&json!({"amount": 5})), None);
    }

    #[test]
    fn substitution_is_a_noop_with_explicit_signal() {
        let input = ClassificationInput {
            image_data: None,
            image_url: None,
            product_name: Some("boots".to_string()),
            product_description: None,
            origin_country: None,
            destination_country: "DE".to_string(),
        };
        let reasoning =
            ClassificationResult::classified(ProviderId::Reasoning, "64039910", "sneakers", 0.9);
        let derived = derive_substitute_input(&input, Some(&reasoning));
        assert_eq!(derived, input);
    }

    #[test]
    fn substitution_copies_label_and_drops_bytes() {
        let input = ClassificationInput {
            image_data: Some(vec![1, 2, 3]),
            image_url: None,
            product_name: None,
            product_description: None,
            origin_country: None,
            destination_country: "DE".to_string(),
        };
        let reasoning = ClassificationResult::classified(
            ProviderId::Reasoning,
            "42022100",
            "leather handbag",
            0.9,
        )
        .with_reasoning("Outer leather surface, handle straps visible");
        let derived = derive_substitute_input(&input, Some(&reasoning));
        assert_eq!(derived.product_name.as_deref(), Some("leather handbag"));
        assert_eq!(
            derived.product_description.as_deref(),
            Some("Outer leather surface, handle straps visible")
        );
        assert!(derived.image_data.is_none());
        // The original stays untouched
        assert!(input.image_data.is_some());
        assert!(input.product_name.is_none());
    }

    #[test]
    fn substitution_skips_errored_reasoning() {
        let input = ClassificationInput {
            image_data: Some(vec![1, 2, 3]),
            image_url: None,
            product_name: None,
            product_description: None,
            origin_country: None,
            destination_country: "DE".to_string(),
        };
        let failed = ClassificationResult::failed(ProviderId::Reasoning, "timeout");
        let derived = derive_substitute_input(&input, Some(&failed));
        assert_eq!(derived, input);
    }

    // Scenario A: explicit value, both providers agree on the full code,
    // confidences 0.9 vs 0.85 => exact and family match, reasoning wins.
    #[tokio::test]
    async fn agreeing_providers_score_reasoning_ahead() {
        let orchestrator = orchestrator(
            MockClassifier::new(ProviderId::Reasoning)
                .with_code("640399")
                .with_confidence(0.9),
            MockClassifier::new(ProviderId::Structured)
                .with_code("640399")
                .with_confidence(0.85),
            MockDutyBackend::new(),
        );
        let aggregate = orchestrator.compare(request()).await.unwrap();

        assert_eq!(aggregate.product_value, Some(250.0));
        assert!(!aggregate.value_estimated);
        let cell = &aggregate.analysis.matches[0];
        assert_eq!(cell.exact, Some(true));
        assert_eq!(cell.family, Some(true));
        assert_eq!(
            aggregate.analysis.winner,
            Some(Winner::Provider(ProviderId::Reasoning))
        );
        assert_eq!(aggregate.duties.len(), 2);
    }

    // Scenario B: bytes-only request; the structured provider must receive
    // the reasoning provider's label, not the raw bytes.
    #[tokio::test]
    async fn structured_call_uses_substituted_text() {
        let structured = MockClassifier::new(ProviderId::Structured).with_code("42022100");
        let orchestrator = orchestrator(
            MockClassifier::new(ProviderId::Reasoning)
                .with_code("42022100")
                .with_description("leather handbag"),
            structured.clone(),
            MockDutyBackend::new(),
        );

        let mut request = request();
        request.product_name = None;
        request.image_base64 =
            Some(base64::engine::general_purpose::STANDARD.encode(b"jpeg-bytes"));
        orchestrator.compare(request).await.unwrap();

        let seen = structured.last_input().unwrap();
        assert_eq!(seen.product_name.as_deref(), Some("leather handbag"));
        assert!(seen.image_data.is_none());
    }

    // Scenario C: no declared value and no estimate => classifications
    // present, no duty entries at all.
    #[tokio::test]
    async fn missing_value_skips_duty_phase() {
        let orchestrator = orchestrator(
            MockClassifier::new(ProviderId::Reasoning),
            MockClassifier::new(ProviderId::Structured),
            MockDutyBackend::new(),
        );
        let mut request = request();
        request.product_value = None;
        let aggregate = orchestrator.compare(request).await.unwrap();

        assert!(aggregate.duties.is_empty());
        assert_eq!(aggregate.classifications.len(), 2);
        assert!(aggregate.product_value.is_none());
        assert!(aggregate.analysis.notes.contains("duty phase was skipped"));
    }

    #[tokio::test]
    async fn estimated_value_feeds_duty_phase() {
        let orchestrator = orchestrator(
            MockClassifier::new(ProviderId::Reasoning).with_estimated_value(json!("149.99")),
            MockClassifier::new(ProviderId::Structured),
            MockDutyBackend::new(),
        );
        let mut request = request();
        request.product_value = None;
        let aggregate = orchestrator.compare(request).await.unwrap();

        assert_eq!(aggregate.product_value, Some(149.99));
        assert!(aggregate.value_estimated);
        assert_eq!(aggregate.duties.len(), 2);
    }

    // Scenario D: intra-union shipment => zero duty, standard VAT, no error.
    #[tokio::test]
    async fn domestic_shipment_is_duty_free() {
        let orchestrator = orchestrator(
            MockClassifier::new(ProviderId::Reasoning),
            MockClassifier::new(ProviderId::Structured),
            MockDutyBackend::new(),
        );
        let mut request = request();
        request.origin_country = Some("FR".to_string());
        let aggregate = orchestrator.compare(request).await.unwrap();

        let duty = aggregate.duties.get(&ProviderId::Structured).unwrap();
        assert!(duty.error.is_none());
        assert_eq!(duty.duty.amount, 0.0);
        assert!((duty.vat.amount - 250.0 * 0.19).abs() < 1e-9);
    }

    // Scenario E: one duty call fails, the other succeeds; the aggregate
    // carries both and the request itself does not fail.
    #[tokio::test]
    async fn duty_failures_stay_local() {
        let orchestrator = orchestrator(
            MockClassifier::new(ProviderId::Reasoning).with_code("64039910"),
            MockClassifier::new(ProviderId::Structured).with_code("42022100"),
            MockDutyBackend::new().failing_for_code("64039910"),
        );
        let aggregate = orchestrator.compare(request()).await.unwrap();

        let failed = aggregate.duties.get(&ProviderId::Reasoning).unwrap();
        assert!(failed.error.is_some());
        assert_eq!(failed.total_landed_cost, 250.0);
        let succeeded = aggregate.duties.get(&ProviderId::Structured).unwrap();
        assert!(succeeded.error.is_none());
        assert!(succeeded.total_landed_cost > 250.0);
    }

    // Structured classification fails but reasoning succeeds: the aggregate
    // still carries a structured duty entry derived from the reasoning code.
    #[tokio::test]
    async fn synthetic_duty_call_fills_structured_slot() {
        let orchestrator = orchestrator(
            MockClassifier::new(ProviderId::Reasoning).with_code("64039910"),
            MockClassifier::new(ProviderId::Structured).failing("upstream 502"),
            MockDutyBackend::new(),
        );
        let aggregate = orchestrator.compare(request()).await.unwrap();

        assert_eq!(aggregate.duties.len(), 2);
        let synthetic = aggregate.duties.get(&ProviderId::Structured).unwrap();
        assert_eq!(synthetic.code, "64039910");
        assert!(synthetic.error.is_none());
        assert!(aggregate
            .analysis
            .notes
            .contains("computed from the reasoning provider's code"));
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_any_call() {
        let reasoning = MockClassifier::new(ProviderId::Reasoning);
        let orchestrator = orchestrator(
            reasoning.clone(),
            MockClassifier::new(ProviderId::Structured),
            MockDutyBackend::new(),
        );
        let mut request = request();
        request.product_name = None;
        request.origin_country = None;
        let result = orchestrator.compare(request).await;
        assert!(result.is_err());
        assert!(reasoning.last_input().is_none());
    }

    #[tokio::test]
    async fn single_provider_comparison_has_no_winner_against_reference() {
        let orchestrator = orchestrator(
            MockClassifier::new(ProviderId::Reasoning).with_confidence(0.9),
            MockClassifier::new(ProviderId::Structured),
            MockDutyBackend::new(),
        );
        let mut request = request();
        request.providers = vec![ProviderId::Reasoning];
        let aggregate = orchestrator.compare(request).await.unwrap();

        assert_eq!(aggregate.classifications.len(), 1);
        assert!(aggregate.analysis.matches.is_empty());
        // No reference present: bare confidence still yields a positive
        // score, so the sole provider wins on its own.
        assert_eq!(
            aggregate.analysis.winner,
            Some(Winner::Provider(ProviderId::Reasoning))
        );
    }

    #[tokio::test]
    async fn aggregate_is_persisted_and_retrievable() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let orchestrator = Orchestrator::new(
            ClassifierClient::Mock(MockClassifier::new(ProviderId::Reasoning)),
            ClassifierClient::Mock(MockClassifier::new(ProviderId::Structured)),
            DutyClient::Mock(MockDutyBackend::new()),
            store.clone(),
            AppConfig::default(),
        );
        let aggregate = orchestrator.compare(request()).await.unwrap();
        use crate::store::ComparisonStore;
        let stored = store.get(aggregate.id).await.unwrap();
        assert_eq!(stored.id, aggregate.id);
    }
}
