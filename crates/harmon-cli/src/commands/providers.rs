//! Provider reachability command

use anyhow::Result;

use harmon_core::classify::{ClassifierBackend, ClassifierClient};
use harmon_core::duty::{DutyBackend, DutyClient};
use harmon_core::AppConfig;

pub async fn cmd_providers(config: AppConfig) -> Result<()> {
    println!("🔍 Checking provider backends...\n");

    let timeout = config.request_timeout_secs;
    let reasoning = ClassifierClient::reasoning_from_env(timeout);
    let structured = ClassifierClient::structured_from_env(timeout);
    let duty = DutyClient::from_env(config.standard_vat_rate, timeout);

    report("reasoning (vision LLM)", reasoning.host(), reasoning.health_check().await);
    report("structured (tariff graph)", structured.host(), structured.health_check().await);
    report("duty (landed cost)", duty.host(), duty.health_check().await);

    println!();
    println!("Environment variables:");
    println!("  HARMON_VISION_HOST / HARMON_VISION_MODEL / HARMON_VISION_API_KEY");
    println!("  HARMON_TARIFF_HOST / HARMON_TARIFF_API_KEY");
    println!("  HARMON_DUTY_HOST / HARMON_DUTY_API_KEY");
    Ok(())
}

fn report(label: &str, host: &str, healthy: bool) {
    let host = if host.is_empty() { "(not configured)" } else { host };
    if healthy {
        println!("  ✅ {}: {}", label, host);
    } else {
        println!("  ❌ {}: {}", label, host);
    }
}
