//! Landed-cost HTTP backend
//!
//! Calls a landed-cost calculation service and assembles its duty, tax, and
//! fee lines into a `DutyResult` with the product value as the first
//! breakdown entry. Domestic shipments never reach the network.
//!
//! # Configuration
//!
//! Environment variables:
//! - `HARMON_DUTY_HOST`: Landed-cost service base URL
//! - `HARMON_DUTY_API_KEY`: API key (required for live calls)

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{CostLineItem, DutyLine, DutyRequest, DutyResult, ProviderId, TaxLine};

use super::{same_customs_union, DutyBackend};

/// Landed-cost calculation backend
#[derive(Clone)]
pub struct LandedCostBackend {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    /// VAT rate applied to domestic shipments, which are answered locally
    standard_vat_rate: f64,
}

impl LandedCostBackend {
    /// Create a new backend
    pub fn new(base_url: &str, standard_vat_rate: f64, timeout_secs: u64) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            standard_vat_rate,
        }
    }

    /// Create with an API key
    pub fn with_api_key(
        base_url: &str,
        api_key: &str,
        standard_vat_rate: f64,
        timeout_secs: u64,
    ) -> Self {
        let mut backend = Self::new(base_url, standard_vat_rate, timeout_secs);
        backend.api_key = Some(api_key.to_string());
        backend
    }

    /// Create from environment variables
    pub fn from_env(standard_vat_rate: f64, timeout_secs: u64) -> Self {
        let host = std::env::var("HARMON_DUTY_HOST").unwrap_or_default();
        let mut backend = Self::new(&host, standard_vat_rate, timeout_secs);
        backend.api_key = std::env::var("HARMON_DUTY_API_KEY").ok();
        backend
    }

    async fn calculate_inner(&self, slot: ProviderId, request: &DutyRequest) -> Result<DutyResult> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::MissingCredential("HARMON_DUTY_API_KEY is not set".into()))?;

        let response = self
            .http_client
            .post(format!("{}/v1/landed-cost", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&json!({
                "hs_code": request.code,
                "value": request.value,
                "currency": request.currency,
                "origin_country": request.origin_country,
                "destination_country": request.destination_country,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::MalformedResponse(format!(
                "Landed-cost service error {}: {}",
                status, body
            )));
        }

        let payload: LandedCostResponse = response.json().await?;
        debug!(?payload, "Landed-cost response");

        let duty = DutyLine {
            amount: payload.duty.amount,
            rate_label: payload.duty.rate,
            category: payload.duty.category,
        };
        let vat = TaxLine {
            amount: payload.vat.amount,
            rate_label: payload.vat.rate,
        };
        let fees = payload
            .fees
            .into_iter()
            .map(|fee| CostLineItem {
                label: fee.name,
                amount: fee.amount,
                rate_label: fee.rate,
            })
            .collect();

        Ok(DutyResult::from_lines(
            slot,
            &request.code,
            request.value,
            duty,
            vat,
            fees,
            &request.currency,
        ))
    }
}

#[async_trait]
impl DutyBackend for LandedCostBackend {
    async fn calculate(&self, slot: ProviderId, request: &DutyRequest) -> DutyResult {
        let started = Instant::now();

        // Intra-union shipments are duty-free with standard VAT; a
        // legitimate outcome the service itself reports as an error.
        if same_customs_union(request.origin_country.as_deref(), &request.destination_country) {
            return DutyResult::domestic(
                slot,
                &request.code,
                request.value,
                self.standard_vat_rate,
                &request.currency,
            )
            .with_latency_ms(started.elapsed().as_millis() as u64);
        }

        if self.base_url.is_empty() {
            let error = Error::MissingCredential("HARMON_DUTY_HOST is not set".into());
            return DutyResult::failed(
                slot,
                &request.code,
                request.value,
                &request.currency,
                error.to_string(),
            );
        }

        let mut result = match self.calculate_inner(slot, request).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, host = %self.base_url, code = %request.code, "Duty calculation failed");
                DutyResult::failed(slot, &request.code, request.value, &request.currency, e.to_string())
            }
        };
        result.latency_ms = started.elapsed().as_millis() as u64;
        result
    }

    async fn health_check(&self) -> bool {
        if self.base_url.is_empty() {
            return false;
        }
        match self
            .http_client
            .get(format!("{}/v1/health", self.base_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

/// Response from the landed-cost service
#[derive(Debug, Deserialize)]
struct LandedCostResponse {
    duty: DutyPayload,
    vat: TaxPayload,
    #[serde(default)]
    fees: Vec<FeePayload>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DutyPayload {
    amount: f64,
    rate: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TaxPayload {
    amount: f64,
    rate: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FeePayload {
    name: String,
    amount: f64,
    #[serde(default)]
    rate: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(origin: Option<&str>) -> DutyRequest {
        DutyRequest {
            code: "64039910".to_string(),
            value: 100.0,
            currency: "EUR".to_string(),
            origin_country: origin.map(str::to_string),
            destination_country: "DE".to_string(),
        }
    }

    #[tokio::test]
    async fn domestic_shipment_skips_network() {
        // Unconfigured backend: any network path would fail, so a clean
        // result proves the domestic branch answered locally.
        let backend = LandedCostBackend::new("", 0.19, 1);
        let result = backend
            .calculate(ProviderId::Structured, &request(Some("FR")))
            .await;
        assert!(result.error.is_none());
        assert_eq!(result.duty.amount, 0.0);
        assert!((result.vat.amount - 19.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unconfigured_backend_fails_to_bare_value() {
        let backend = LandedCostBackend::new("", 0.19, 1);
        let result = backend
            .calculate(ProviderId::Reasoning, &request(Some("CN")))
            .await;
        assert!(result.error.is_some());
        assert_eq!(result.total_landed_cost, 100.0);
    }

    #[tokio::test]
    async fn unreachable_host_fails_to_bare_value() {
        let backend = LandedCostBackend::with_api_key("http://127.0.0.1:9", "key", 0.19, 1);
        let result = backend
            .calculate(ProviderId::Structured, &request(Some("CN")))
            .await;
        assert!(result.error.is_some());
        assert_eq!(result.total_landed_cost, 100.0);
        assert_eq!(result.duty.amount, 0.0);
    }
}
