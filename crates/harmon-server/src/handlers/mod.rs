//! HTTP request handlers
//!
//! Each submodule contains handlers for a specific API area.

pub mod comparisons;
pub mod health;

// Re-export all handlers for use in router
pub use comparisons::*;
pub use health::*;
