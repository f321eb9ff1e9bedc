//! harmon configuration
//!
//! Runtime tunables for the comparison pipeline: request defaults, the
//! standard VAT rate applied to domestic shipments, the thresholds used by
//! the summary generator, and which provider acts as the scoring reference.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a three-layer resolution:
//! 1. Explicit path (e.g. `--config` on the CLI)
//! 2. `HARMON_CONFIG` environment variable
//! 3. `~/.config/harmon/config.toml`
//!
//! Missing files fall back to defaults; a present-but-malformed file is an
//! error rather than a silent fallback.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::ProviderId;

/// Runtime configuration for the comparison pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Destination country applied when the request omits one (ISO 3166-1 alpha-2)
    pub default_destination: String,
    /// Currency applied when the request omits one (ISO 4217)
    pub default_currency: String,
    /// VAT rate applied to domestic shipments (fraction, e.g. 0.19)
    pub standard_vat_rate: f64,
    /// Duty-total deltas above this are called out as significant (currency units)
    pub duty_delta_threshold: f64,
    /// Confidence gaps above this get a callout in the summary
    pub confidence_gap_threshold: f64,
    /// Provider whose classification other providers are scored against
    pub reference_provider: ProviderId,
    /// Per-call timeout for outbound provider requests
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_destination: "DE".to_string(),
            default_currency: "EUR".to_string(),
            standard_vat_rate: 0.19,
            duty_delta_threshold: 50.0,
            confidence_gap_threshold: 0.2,
            reference_provider: ProviderId::Structured,
            request_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration, resolving the file location as documented above
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var("HARMON_CONFIG") {
            return Self::from_file(Path::new(&path));
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Default config file location (~/.config/harmon/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("harmon").join("config.toml"))
    }

    fn validate(&self) -> Result<()> {
        if self.default_destination.len() != 2
            || !self.default_destination.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(Error::Config(format!(
                "default_destination must be a 2-letter country code, got {:?}",
                self.default_destination
            )));
        }
        if self.default_currency.len() != 3
            || !self.default_currency.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(Error::Config(format!(
                "default_currency must be a 3-letter currency code, got {:?}",
                self.default_currency
            )));
        }
        if !(0.0..1.0).contains(&self.standard_vat_rate) {
            return Err(Error::Config(format!(
                "standard_vat_rate must be a fraction in [0, 1), got {}",
                self.standard_vat_rate
            )));
        }
        Ok(())
    }
}
