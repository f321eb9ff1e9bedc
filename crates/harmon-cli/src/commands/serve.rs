//! Server command implementation

use std::sync::Arc;

use anyhow::Result;

use harmon_core::{AppConfig, MemoryStore, Orchestrator};
use harmon_server::AppState;

pub async fn cmd_serve(host: &str, port: u16, config: AppConfig) -> Result<()> {
    println!("🚀 Starting harmon server...");
    println!("   Listening: http://{}:{}", host, port);
    println!(
        "   Defaults: destination {}, currency {}",
        config.default_destination, config.default_currency
    );
    println!("   Reference provider: {}", config.reference_provider);

    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::from_env(store.clone(), config);
    let state = Arc::new(AppState {
        orchestrator,
        store,
    });

    harmon_server::serve(host, port, state).await
}
