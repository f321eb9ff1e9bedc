//! Mock duty backend for testing
//!
//! Applies fixed duty and VAT rates, with optional failure and domestic
//! handling matching the live backend.

use async_trait::async_trait;

use crate::models::{DutyLine, DutyRequest, DutyResult, ProviderId, TaxLine};

use super::{same_customs_union, DutyBackend};

/// Mock duty backend with fixed rates
#[derive(Clone)]
pub struct MockDutyBackend {
    duty_rate: f64,
    vat_rate: f64,
    failure: Option<String>,
    /// Fail only calculations against this code; others succeed
    fail_for_code: Option<String>,
    pub healthy: bool,
}

impl MockDutyBackend {
    /// Create a mock with 8% duty and 19% VAT
    pub fn new() -> Self {
        Self {
            duty_rate: 0.08,
            vat_rate: 0.19,
            failure: None,
            fail_for_code: None,
            healthy: true,
        }
    }

    pub fn with_rates(mut self, duty_rate: f64, vat_rate: f64) -> Self {
        self.duty_rate = duty_rate;
        self.vat_rate = vat_rate;
        self
    }

    /// Make every calculation return an error-carrying result
    pub fn failing(mut self, error: &str) -> Self {
        self.failure = Some(error.to_string());
        self
    }

    /// Fail only calculations against one specific code
    pub fn failing_for_code(mut self, code: &str) -> Self {
        self.fail_for_code = Some(code.to_string());
        self
    }
}

impl Default for MockDutyBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DutyBackend for MockDutyBackend {
    async fn calculate(&self, slot: ProviderId, request: &DutyRequest) -> DutyResult {
        if let Some(ref error) = self.failure {
            return DutyResult::failed(
                slot,
                &request.code,
                request.value,
                &request.currency,
                error.clone(),
            )
            .with_latency_ms(1);
        }

        if self.fail_for_code.as_deref() == Some(request.code.as_str()) {
            return DutyResult::failed(
                slot,
                &request.code,
                request.value,
                &request.currency,
                "simulated transport error",
            )
            .with_latency_ms(1);
        }

        if same_customs_union(request.origin_country.as_deref(), &request.destination_country) {
            return DutyResult::domestic(
                slot,
                &request.code,
                request.value,
                self.vat_rate,
                &request.currency,
            )
            .with_latency_ms(1);
        }

        let duty_amount = request.value * self.duty_rate;
        let vat_amount = (request.value + duty_amount) * self.vat_rate;
        DutyResult::from_lines(
            slot,
            &request.code,
            request.value,
            DutyLine {
                amount: duty_amount,
                rate_label: format!("{}%", self.duty_rate * 100.0),
                category: None,
            },
            TaxLine {
                amount: vat_amount,
                rate_label: format!("{}%", self.vat_rate * 100.0),
            },
            Vec::new(),
            &request.currency,
        )
        .with_latency_ms(1)
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LANDED_COST_TOLERANCE;

    #[tokio::test]
    async fn applies_fixed_rates() {
        let backend = MockDutyBackend::new();
        let request = DutyRequest {
            code: "64039910".to_string(),
            value: 100.0,
            currency: "EUR".to_string(),
            origin_country: Some("CN".to_string()),
            destination_country: "DE".to_string(),
        };
        let result = backend.calculate(ProviderId::Reasoning, &request).await;
        assert!(result.is_ok());
        assert!((result.duty.amount - 8.0).abs() < LANDED_COST_TOLERANCE);
        assert!((result.vat.amount - 20.52).abs() < LANDED_COST_TOLERANCE);
        assert!((result.total_landed_cost - 128.52).abs() < LANDED_COST_TOLERANCE);
    }
}
