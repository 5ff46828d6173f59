//! Categorizer configuration
//!
//! Thresholds, the model artifact location and enrichment timing.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/tally/config/categorizer.toml)
//!    or an explicitly supplied path
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! `TALLY_MODEL_PATH` overrides the model path from either layer.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/categorizer.toml");

/// Confidence reported for rule-tier matches
pub const RULE_CONFIDENCE: f64 = 0.85;
/// Confidence reported by the fallback tier
pub const FALLBACK_CONFIDENCE: f64 = 0.3;
/// External answers must exceed this to be accepted
pub const EXTERNAL_ACCEPTANCE: f64 = 0.7;
/// Minimum statistical probability to accept a prediction
pub const STATISTICAL_ACCEPTANCE: f64 = 0.3;
/// Minimum probability for a category to be listed as an alternate
pub const ALTERNATE_THRESHOLD: f64 = 0.10;
/// Default per-call deadline for the external API
pub const DEFAULT_ENRICHMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Confidence thresholds used across the tiers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub rule_confidence: f64,
    pub fallback_confidence: f64,
    pub external_acceptance: f64,
    pub statistical_acceptance: f64,
    pub alternate_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            rule_confidence: RULE_CONFIDENCE,
            fallback_confidence: FALLBACK_CONFIDENCE,
            external_acceptance: EXTERNAL_ACCEPTANCE,
            statistical_acceptance: STATISTICAL_ACCEPTANCE,
            alternate_threshold: ALTERNATE_THRESHOLD,
        }
    }
}

/// Full categorizer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CategorizerConfig {
    pub thresholds: Thresholds,
    /// Trained model artifact; `None` disables the statistical tier
    pub model_path: Option<PathBuf>,
    /// Consult the keyword matcher before the catch-all
    pub keyword_fallback: bool,
    pub enrichment_timeout: Duration,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            model_path: default_model_path(),
            keyword_fallback: true,
            enrichment_timeout: DEFAULT_ENRICHMENT_TIMEOUT,
        }
    }
}

impl CategorizerConfig {
    /// Load configuration (override first, then embedded default)
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let content = resolve_config_text(override_path, "categorizer.toml", DEFAULT_CONFIG)?;
        let mut config = parse_config(&content)?;

        if let Ok(path) = std::env::var("TALLY_MODEL_PATH") {
            if !path.trim().is_empty() {
                config.model_path = Some(PathBuf::from(path));
            }
        }

        Ok(config)
    }
}

/// Tally's data directory (~/.local/share/tally on Linux)
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally"))
}

/// Default config override path for a file name
pub fn default_config_path(file_name: &str) -> Option<PathBuf> {
    data_dir().map(|d| d.join("config").join(file_name))
}

/// Default location of the trained model artifact
pub fn default_model_path() -> Option<PathBuf> {
    data_dir().map(|d| d.join("model.json"))
}

/// Read the override file if it exists, otherwise return the embedded text
pub(crate) fn resolve_config_text(
    override_path: Option<&Path>,
    file_name: &str,
    embedded: &str,
) -> Result<String> {
    let path = match override_path {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path(file_name),
    };

    match path {
        Some(p) if p.exists() => {
            debug!(path = %p.display(), "Loading config override");
            fs::read_to_string(&p).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", p.display(), e))
            })
        }
        _ => Ok(embedded.to_string()),
    }
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    thresholds: Option<RawThresholds>,
    model: Option<RawModel>,
    fallback: Option<RawFallback>,
    enrichment: Option<RawEnrichment>,
}

#[derive(Debug, Deserialize)]
struct RawThresholds {
    rule_confidence: Option<f64>,
    fallback_confidence: Option<f64>,
    external_acceptance: Option<f64>,
    statistical_acceptance: Option<f64>,
    alternate_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawFallback {
    keywords: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawEnrichment {
    timeout_secs: Option<u64>,
}

/// Parse config from TOML content
pub fn parse_config(content: &str) -> Result<CategorizerConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = CategorizerConfig::default();

    if let Some(t) = raw.thresholds {
        let th = &mut config.thresholds;
        for (name, value, slot) in [
            ("rule_confidence", t.rule_confidence, &mut th.rule_confidence),
            (
                "fallback_confidence",
                t.fallback_confidence,
                &mut th.fallback_confidence,
            ),
            (
                "external_acceptance",
                t.external_acceptance,
                &mut th.external_acceptance,
            ),
            (
                "statistical_acceptance",
                t.statistical_acceptance,
                &mut th.statistical_acceptance,
            ),
            (
                "alternate_threshold",
                t.alternate_threshold,
                &mut th.alternate_threshold,
            ),
        ] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(Error::Config(format!(
                        "{} must be within [0, 1], got {}",
                        name, v
                    )));
                }
                *slot = v;
            }
        }
    }

    if let Some(model) = raw.model {
        if let Some(path) = model.path {
            config.model_path = Some(path);
        }
    }

    if let Some(fallback) = raw.fallback {
        if let Some(keywords) = fallback.keywords {
            config.keyword_fallback = keywords;
        }
    }

    if let Some(enrichment) = raw.enrichment {
        if let Some(secs) = enrichment.timeout_secs {
            config.enrichment_timeout = Duration::from_secs(secs);
        }
    }

    Ok(config)
}
