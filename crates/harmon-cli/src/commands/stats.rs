//! Statistics query command

use anyhow::{Context, Result};

pub async fn cmd_stats(server_url: &str) -> Result<()> {
    let url = format!("{}/api/comparisons/stats", server_url.trim_end_matches('/'));
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("Server returned {}", response.status());
    }

    let stats: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
