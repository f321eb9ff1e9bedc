//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `compare` - One-shot comparison against the configured backends
//! - `providers` - Backend reachability checks
//! - `serve` - Web server command
//! - `stats` - Statistics query against a running server

pub mod compare;
pub mod providers;
pub mod serve;
pub mod stats;

pub use compare::{cmd_compare, CompareArgs};
pub use providers::cmd_providers;
pub use serve::cmd_serve;
pub use stats::cmd_stats;
