//! Duty-calculation provider abstraction
//!
//! Same contract shape as the classification adapters: one uniform async
//! call that never raises. A failed calculation comes back as a `DutyResult`
//! with a populated `error` field and the landed cost defaulted to the bare
//! product value — no duty or tax is ever assumed on failure.
//!
//! Domestic shipments (origin and destination inside one customs union) are
//! a recognized business outcome, not an error: they are detected before any
//! network call and answered locally as zero-duty, standard-VAT.

mod landed_cost;
mod mock;

pub use landed_cost::LandedCostBackend;
pub use mock::MockDutyBackend;

use async_trait::async_trait;

use crate::models::{DutyRequest, DutyResult, ProviderId};

/// EU member states (customs union); shipments between any two are duty-free
const EU_MEMBERS: &[&str] = &[
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE", "IT",
    "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
];

/// Whether origin and destination fall inside the same customs union
///
/// An unknown origin is treated as international: the duty provider decides.
pub fn same_customs_union(origin: Option<&str>, destination: &str) -> bool {
    let Some(origin) = origin else {
        return false;
    };
    if origin.eq_ignore_ascii_case(destination) {
        return true;
    }
    let origin_eu = EU_MEMBERS.iter().any(|m| m.eq_ignore_ascii_case(origin));
    let destination_eu = EU_MEMBERS
        .iter()
        .any(|m| m.eq_ignore_ascii_case(destination));
    origin_eu && destination_eu
}

/// Uniform contract for duty-calculation providers
#[async_trait]
pub trait DutyBackend: Send + Sync {
    /// Calculate duty/tax/fees for one code and value
    ///
    /// `slot` names the provider slot the result is filed under, which may
    /// differ from the provider that produced the code (synthetic fallback
    /// calls reuse the reasoning code under the structured slot).
    async fn calculate(&self, slot: ProviderId, request: &DutyRequest) -> DutyResult;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete duty client enum
#[derive(Clone)]
pub enum DutyClient {
    /// Landed-cost HTTP service
    LandedCost(LandedCostBackend),
    /// Mock backend for testing
    Mock(MockDutyBackend),
}

impl DutyClient {
    /// Build the duty client from environment variables
    pub fn from_env(standard_vat_rate: f64, timeout_secs: u64) -> Self {
        DutyClient::LandedCost(LandedCostBackend::from_env(standard_vat_rate, timeout_secs))
    }

    /// Create a mock duty client for testing
    pub fn mock() -> Self {
        DutyClient::Mock(MockDutyBackend::new())
    }
}

#[async_trait]
impl DutyBackend for DutyClient {
    async fn calculate(&self, slot: ProviderId, request: &DutyRequest) -> DutyResult {
        match self {
            DutyClient::LandedCost(b) => b.calculate(slot, request).await,
            DutyClient::Mock(b) => b.calculate(slot, request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            DutyClient::LandedCost(b) => b.health_check().await,
            DutyClient::Mock(b) => b.health_check().await,
        }
    }

    fn host(&self) -> &str {
        match self {
            DutyClient::LandedCost(b) => b.host(),
            DutyClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_country_is_domestic() {
        assert!(same_customs_union(Some("DE"), "DE"));
        assert!(same_customs_union(Some("de"), "DE"));
    }

    #[test]
    fn eu_pair_is_domestic() {
        assert!(same_customs_union(Some("FR"), "DE"));
        assert!(same_customs_union(Some("at"), "ES"));
    }

    #[test]
    fn third_country_is_international() {
        assert!(!same_customs_union(Some("CN"), "DE"));
        assert!(!same_customs_union(Some("GB"), "FR"));
        assert!(!same_customs_union(None, "DE"));
    }
}
