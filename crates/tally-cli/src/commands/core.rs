//! Shared command utilities
//!
//! - `load_categorizer` - Assemble the tier chain from CLI paths, config and env
//! - `read_transactions` - Load a transactions CSV into a store

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{Categorizer, CategorizerConfig, MemoryStore};
use tracing::info;

/// Build the categorizer from config, with optional rule and model overrides
pub fn load_categorizer(
    config_path: Option<&Path>,
    rules_path: Option<&Path>,
    model_path: Option<&Path>,
) -> Result<Categorizer> {
    let mut config =
        CategorizerConfig::load(config_path).context("Failed to load categorizer config")?;
    if let Some(path) = model_path {
        config.model_path = Some(path.to_path_buf());
    }

    let categorizer =
        Categorizer::from_config(config, rules_path).context("Failed to build categorizer")?;
    info!(tiers = ?categorizer.tier_names(), "Categorizer ready");
    Ok(categorizer)
}

/// Load a transactions CSV
pub fn read_transactions(path: &Path) -> Result<MemoryStore> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    MemoryStore::load_csv(file).with_context(|| format!("Failed to parse {}", path.display()))
}
