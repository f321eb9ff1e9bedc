//! Domain types for classification comparison and duty aggregation
//!
//! Everything a comparison produces is immutable once constructed: adapters
//! build one `ClassificationResult` or `DutyResult` per call, the
//! orchestrator assembles them into an `AggregateComparisonResult`, and the
//! store hands out shared references.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Tolerance for the landed-cost sum invariant
pub const LANDED_COST_TOLERANCE: f64 = 1e-6;

/// Classification providers harmon knows how to call
///
/// A closed set: the reasoning provider takes open-ended image/text input
/// and also estimates a product value; the structured provider takes
/// normalized text or a resolvable image URL and is paired with the
/// duty-calculation capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Reasoning,
    Structured,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Reasoning => "reasoning",
            ProviderId::Structured => "structured",
        }
    }

    pub fn all() -> &'static [ProviderId] {
        &[ProviderId::Reasoning, ProviderId::Structured]
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "reasoning" => Ok(ProviderId::Reasoning),
            "structured" => Ok(ProviderId::Structured),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

fn default_providers() -> Vec<ProviderId> {
    vec![ProviderId::Reasoning, ProviderId::Structured]
}

fn default_calculate_duty() -> bool {
    true
}

/// Inbound comparison request
///
/// The image may arrive inline (base64) or as a remote URL, never both.
/// Omitted destination and currency fall back to configured defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRequest {
    /// Inline image payload, base64-encoded
    #[serde(default)]
    pub image_base64: Option<String>,
    /// Remote image URL
    #[serde(default)]
    pub image_url: Option<String>,
    /// Free-text product name
    #[serde(default)]
    pub product_name: Option<String>,
    /// Free-text product description
    #[serde(default)]
    pub product_description: Option<String>,
    /// Origin country (ISO 3166-1 alpha-2)
    #[serde(default)]
    pub origin_country: Option<String>,
    /// Destination country (ISO 3166-1 alpha-2); configured default when omitted
    #[serde(default)]
    pub destination_country: Option<String>,
    /// Declared product value in `currency`
    #[serde(default)]
    pub product_value: Option<f64>,
    /// ISO 4217 currency code; configured default when omitted
    #[serde(default)]
    pub currency: Option<String>,
    /// Providers to invoke
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderId>,
    /// Whether to run the duty phase
    #[serde(default = "default_calculate_duty")]
    pub calculate_duty: bool,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn check_country(code: &str, field: &str) -> Result<()> {
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::Validation(format!(
            "{} must be a 2-letter country code, got {:?}",
            field, code
        )));
    }
    Ok(())
}

impl ComparisonRequest {
    /// Validate the request before any provider call is made
    ///
    /// Rejected requests never reach an adapter; this is the only error the
    /// orchestrator surfaces synchronously.
    pub fn validate(&self) -> Result<()> {
        let has_signal = present(&self.image_base64).is_some()
            || present(&self.image_url).is_some()
            || present(&self.product_name).is_some()
            || present(&self.product_description).is_some();
        if !has_signal {
            return Err(Error::Validation(
                "At least one of image_base64, image_url, product_name, product_description is required"
                    .to_string(),
            ));
        }

        if present(&self.image_base64).is_some() && present(&self.image_url).is_some() {
            return Err(Error::Validation(
                "image_base64 and image_url are mutually exclusive".to_string(),
            ));
        }

        if let Some(encoded) = present(&self.image_base64) {
            base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| Error::Validation(format!("image_base64 is not valid base64: {}", e)))?;
        }

        if let Some(origin) = present(&self.origin_country) {
            check_country(origin, "origin_country")?;
        }
        if let Some(destination) = present(&self.destination_country) {
            check_country(destination, "destination_country")?;
        }

        if let Some(currency) = present(&self.currency) {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(Error::Validation(format!(
                    "currency must be a 3-letter code, got {:?}",
                    currency
                )));
            }
        }

        if self.providers.is_empty() {
            return Err(Error::Validation(
                "At least one provider must be requested".to_string(),
            ));
        }

        Ok(())
    }

    /// Requested providers, deduplicated in request order
    pub fn requested_providers(&self) -> Vec<ProviderId> {
        let mut seen = Vec::new();
        for provider in &self.providers {
            if !seen.contains(provider) {
                seen.push(*provider);
            }
        }
        seen
    }

    /// Build the adapter-facing input, applying the configured defaults
    ///
    /// Assumes `validate()` has passed; the base64 decode cannot fail after
    /// validation, but the error is propagated rather than unwrapped.
    pub fn to_input(&self, default_destination: &str) -> Result<ClassificationInput> {
        let image_data = match present(&self.image_base64) {
            Some(encoded) => Some(
                base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| Error::Validation(format!("image_base64: {}", e)))?,
            ),
            None => None,
        };

        Ok(ClassificationInput {
            image_data,
            image_url: present(&self.image_url).map(str::to_string),
            product_name: present(&self.product_name).map(str::to_string),
            product_description: present(&self.product_description).map(str::to_string),
            origin_country: present(&self.origin_country).map(str::to_uppercase),
            destination_country: present(&self.destination_country)
                .map(str::to_uppercase)
                .unwrap_or_else(|| default_destination.to_uppercase()),
        })
    }
}

/// Normalized adapter input derived from a validated request
///
/// The orchestrator never mutates this; input substitution produces a
/// derived copy for the structured call only.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationInput {
    /// Decoded inline image bytes
    pub image_data: Option<Vec<u8>>,
    /// Remote image URL
    pub image_url: Option<String>,
    pub product_name: Option<String>,
    pub product_description: Option<String>,
    pub origin_country: Option<String>,
    pub destination_country: String,
}

impl ClassificationInput {
    /// Whether the input carries anything besides inline image bytes
    ///
    /// The structured provider cannot consume raw bytes; when this is false
    /// its call must use substituted text fields instead.
    pub fn has_explicit_signal(&self) -> bool {
        self.image_url.is_some() || self.product_name.is_some() || self.product_description.is_some()
    }
}

/// Strip formatting from a provider-supplied HS code
///
/// Providers disagree on punctuation ("6403.99.10" vs "64039910"); prefix
/// comparisons only make sense over the bare alphanumeric form.
pub fn normalize_code(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// One provider's classification of one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub provider: ProviderId,
    /// Full hierarchical HS code, normalized to bare alphanumerics
    pub code: String,
    /// 6-digit prefix of `code`; equals `code` when the code is shorter
    pub hs6: String,
    /// 8-digit prefix of `code`, when the code is long enough
    #[serde(default)]
    pub hs8: Option<String>,
    /// Human description of the classified product
    pub description: String,
    /// Provider confidence in [0, 1]; 0 for errored results
    pub confidence: f64,
    /// Free-text reasoning, when the provider supplies one
    #[serde(default)]
    pub reasoning: Option<String>,
    /// AI-estimated monetary value in its raw numeric-or-string form
    /// (reasoning provider only)
    #[serde(default)]
    pub estimated_value: Option<serde_json::Value>,
    /// Raw provider payload for forensic debugging
    #[serde(default)]
    pub raw_response: Option<serde_json::Value>,
    /// Wall-clock latency of the adapter call
    pub latency_ms: u64,
    /// Populated instead of raising; a non-empty error means the code fields
    /// are empty and confidence is 0
    #[serde(default)]
    pub error: Option<String>,
}

impl ClassificationResult {
    /// Build a successful classification
    ///
    /// `hs6`/`hs8` are derived from the full code here and nowhere else, so
    /// the prefix-nesting invariant holds for every non-error result.
    pub fn classified(
        provider: ProviderId,
        raw_code: &str,
        description: &str,
        confidence: f64,
    ) -> Self {
        let code = normalize_code(raw_code);
        let hs6 = if code.len() >= 6 {
            code[..6].to_string()
        } else {
            code.clone()
        };
        let hs8 = if code.len() >= 8 {
            Some(code[..8].to_string())
        } else {
            None
        };
        Self {
            provider,
            code,
            hs6,
            hs8,
            description: description.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: None,
            estimated_value: None,
            raw_response: None,
            latency_ms: 0,
            error: None,
        }
    }

    /// Build an error-carrying result; adapters return this instead of raising
    pub fn failed(provider: ProviderId, error: impl Into<String>) -> Self {
        Self {
            provider,
            code: String::new(),
            hs6: String::new(),
            hs8: None,
            description: String::new(),
            confidence: 0.0,
            reasoning: None,
            estimated_value: None,
            raw_response: None,
            latency_ms: 0,
            error: Some(error.into()),
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_estimated_value(mut self, value: serde_json::Value) -> Self {
        self.estimated_value = Some(value);
        self
    }

    pub fn with_raw_response(mut self, raw: serde_json::Value) -> Self {
        self.raw_response = Some(raw);
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Whether this result carries a usable classification
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && !self.code.is_empty()
    }
}

/// Input to one duty calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DutyRequest {
    pub code: String,
    /// Declared product value; always positive by the time a request is built
    pub value: f64,
    pub currency: String,
    pub origin_country: Option<String>,
    pub destination_country: String,
}

/// One named line in a duty breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostLineItem {
    pub label: String,
    pub amount: f64,
    #[serde(default)]
    pub rate_label: Option<String>,
}

/// The customs-duty line of a duty result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DutyLine {
    pub amount: f64,
    pub rate_label: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// The VAT/tax line of a duty result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxLine {
    pub amount: f64,
    pub rate_label: String,
}

/// One provider slot's duty calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DutyResult {
    /// Which provider slot this was computed for (may carry a substituted
    /// code when that slot's own classification failed)
    pub provider: ProviderId,
    /// The code the calculation was run against
    pub code: String,
    pub duty: DutyLine,
    pub vat: TaxLine,
    /// Ordered named line items; the first is always the declared product value
    pub breakdown: Vec<CostLineItem>,
    /// Product value plus all duties, taxes, and fees
    pub total_landed_cost: f64,
    pub currency: String,
    pub latency_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
}

impl DutyResult {
    /// Assemble a successful duty result from its lines
    ///
    /// The breakdown is built product-value-first and the total is the sum
    /// of all lines, so the landed-cost invariant holds by construction.
    pub fn from_lines(
        provider: ProviderId,
        code: &str,
        value: f64,
        duty: DutyLine,
        vat: TaxLine,
        fees: Vec<CostLineItem>,
        currency: &str,
    ) -> Self {
        let mut breakdown = vec![CostLineItem {
            label: "Product value".to_string(),
            amount: value,
            rate_label: None,
        }];
        breakdown.push(CostLineItem {
            label: "Customs duty".to_string(),
            amount: duty.amount,
            rate_label: Some(duty.rate_label.clone()),
        });
        breakdown.push(CostLineItem {
            label: "VAT".to_string(),
            amount: vat.amount,
            rate_label: Some(vat.rate_label.clone()),
        });
        breakdown.extend(fees);
        let total_landed_cost: f64 = breakdown.iter().map(|item| item.amount).sum();
        Self {
            provider,
            code: code.to_string(),
            duty,
            vat,
            breakdown,
            total_landed_cost,
            currency: currency.to_string(),
            latency_ms: 0,
            error: None,
        }
    }

    /// Zero-duty, standard-VAT result for a shipment inside one customs union
    ///
    /// A legitimate business outcome, not a failure: no error field is set.
    pub fn domestic(
        provider: ProviderId,
        code: &str,
        value: f64,
        vat_rate: f64,
        currency: &str,
    ) -> Self {
        let duty = DutyLine {
            amount: 0.0,
            rate_label: "0%".to_string(),
            category: Some("domestic".to_string()),
        };
        let vat = TaxLine {
            amount: value * vat_rate,
            rate_label: format!("{}%", vat_rate * 100.0),
        };
        Self::from_lines(provider, code, value, duty, vat, Vec::new(), currency)
    }

    /// Error-carrying result: no duty or tax assumed, total defaults to the
    /// bare product value
    pub fn failed(
        provider: ProviderId,
        code: &str,
        value: f64,
        currency: &str,
        error: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            code: code.to_string(),
            duty: DutyLine {
                amount: 0.0,
                rate_label: String::new(),
                category: None,
            },
            vat: TaxLine {
                amount: 0.0,
                rate_label: String::new(),
            },
            breakdown: vec![CostLineItem {
                label: "Product value".to_string(),
                amount: value,
                rate_label: None,
            }],
            total_landed_cost: value,
            currency: currency.to_string(),
            latency_ms: 0,
            error: Some(error.into()),
        }
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// One cell of the cross-provider match matrix
///
/// `None` means the comparison was not possible (a side absent or errored),
/// which is distinct from `Some(false)` ("compared and differ").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCell {
    pub left: ProviderId,
    pub right: ProviderId,
    pub exact: Option<bool>,
    pub family: Option<bool>,
}

/// Outcome of scoring the providers against the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Provider(ProviderId),
    Tie,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Winner::Provider(p) => p.as_str(),
            Winner::Tie => "tie",
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Winner {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == "tie" {
            return Ok(Winner::Tie);
        }
        s.parse::<ProviderId>().map(Winner::Provider)
    }
}

impl Serialize for Winner {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Winner {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Cross-provider analysis attached to every aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// One cell per unordered pair of requested providers
    pub matches: Vec<MatchCell>,
    /// Confidence per requested provider (0 for errored results)
    pub confidence: HashMap<ProviderId, f64>,
    /// Absolute landed-cost delta per provider pair, keyed
    /// "reasoning_vs_structured"; present only when both calculations succeeded
    pub duty_deltas: HashMap<String, f64>,
    /// Winning provider, "tie" on shared positive scores, absent when all
    /// scores are zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
    /// Advisory prose; never re-parsed downstream
    pub notes: String,
}

/// Everything one comparison produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateComparisonResult {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// The original request, never mutated by substitution
    pub request: ComparisonRequest,
    /// Resolved product value; absent when none was supplied or estimated
    pub product_value: Option<f64>,
    /// Whether the value came from the reasoning provider's estimate rather
    /// than the request
    pub value_estimated: bool,
    pub currency: String,
    /// Sparse: a provider absent from the request is simply not a key
    pub classifications: HashMap<ProviderId, ClassificationResult>,
    /// Sparse: present only when a usable value existed
    pub duties: HashMap<ProviderId, DutyResult>,
    pub analysis: Analysis,
}
