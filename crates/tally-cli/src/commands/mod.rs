//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (load_categorizer, read_transactions)
//! - `categorize` - Single-description categorization
//! - `batch` - Month-by-month CSV categorization with overrides
//! - `training` - Model training
//! - `demo` - Demo accuracy runs
//! - `info` - Category and rule listings

pub mod batch;
pub mod categorize;
pub mod core;
pub mod demo;
pub mod info;
pub mod training;

// Re-export command functions for main.rs
pub use batch::*;
pub use categorize::*;
pub use core::*;
pub use demo::*;
pub use info::*;
pub use training::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
