//! harmon core library
//!
//! Compares independent product-classification providers, harmonizes their
//! customs codes, resolves a product value, and aggregates per-provider
//! duty calculations with independent failure handling.
//!
//! Modules:
//! - `classify`: classification provider adapters behind a uniform contract
//! - `duty`: duty-calculation adapter with customs-union handling
//! - `matcher` / `scorer` / `summary`: pure cross-provider analysis
//! - `orchestrator`: sequencing, input substitution, duty fan-out
//! - `store`: process-lifetime result storage and statistics
//! - `config`: runtime tunables loaded from TOML

pub mod classify;
pub mod config;
pub mod duty;
pub mod error;
pub mod matcher;
pub mod models;
pub mod orchestrator;
pub mod scorer;
pub mod store;
pub mod summary;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
pub use store::{ComparisonStore, MemoryStore};
