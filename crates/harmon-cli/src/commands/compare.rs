//! One-shot comparison command

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::Engine;

use harmon_core::models::{ComparisonRequest, ProviderId};
use harmon_core::{AppConfig, MemoryStore, Orchestrator};

/// Arguments for `harmon compare`
pub struct CompareArgs {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub image_file: Option<PathBuf>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub value: Option<f64>,
    pub currency: Option<String>,
    pub providers: String,
    pub no_duty: bool,
}

pub async fn cmd_compare(config: AppConfig, args: CompareArgs) -> Result<()> {
    let providers = parse_providers(&args.providers)?;

    let image_base64 = match args.image_file {
        Some(ref path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Some(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
        None => None,
    };

    let request = ComparisonRequest {
        image_base64,
        image_url: args.image_url,
        product_name: args.name,
        product_description: args.description,
        origin_country: args.origin,
        destination_country: args.destination,
        product_value: args.value,
        currency: args.currency,
        providers,
        calculate_duty: !args.no_duty,
    };

    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::from_env(store, config);
    let aggregate = orchestrator.compare(request).await?;

    println!("{}", serde_json::to_string_pretty(&aggregate)?);
    Ok(())
}

fn parse_providers(spec: &str) -> Result<Vec<ProviderId>> {
    let mut providers = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let provider: ProviderId = part
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .with_context(|| format!("Invalid provider {:?}", part))?;
        if !providers.contains(&provider) {
            providers.push(provider);
        }
    }
    if providers.is_empty() {
        bail!("No providers specified (expected reasoning and/or structured)");
    }
    Ok(providers)
}
