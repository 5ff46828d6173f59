//! External enrichment API abstraction
//!
//! A third-party categorization service is consulted after the rule tier.
//! Its answers arrive as free-form category labels and are translated to
//! [`Category`](crate::category::Category) by the enrichment tier; labels
//! outside the taxonomy count as no answer.
//!
//! # Architecture
//!
//! - `EnrichmentBackend` trait: the single operation every backend provides
//! - `EnrichmentClient` enum: concrete wrapper providing Clone + static dispatch
//! - Backend implementations: `HttpEnrichment`, `MockEnrichment`
//!
//! # Configuration
//!
//! Environment variables:
//! - `TALLY_ENRICHMENT_BACKEND`: `http` (default) or `mock`
//! - `TALLY_ENRICHMENT_API_KEY`: bearer token (required for `http`)
//! - `TALLY_ENRICHMENT_URL`: endpoint (default: [`DEFAULT_ENRICHMENT_URL`])
//! - `TALLY_ENRICHMENT_TIMEOUT_SECS`: per-call deadline override

mod http;
mod mock;

pub use http::{HttpEnrichment, DEFAULT_ENRICHMENT_URL};
pub use mock::MockEnrichment;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// What the external service said about one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    /// Category label as the service spells it
    pub category: String,
    pub confidence: f64,
    /// Cleaned-up merchant name, when provided
    pub merchant_name: Option<String>,
}

/// Interface for all enrichment backends
#[async_trait]
pub trait EnrichmentBackend: Send + Sync {
    /// Look up one transaction. `Ok(None)` means the service had no answer.
    async fn enrich(&self, description: &str, amount: Option<f64>) -> Result<Option<Enrichment>>;

    /// Backend name (for logging)
    fn name(&self) -> &str;
}

/// Concrete enrichment client enum
#[derive(Clone)]
pub enum EnrichmentClient {
    /// JSON-over-HTTPS categorization API
    Http(HttpEnrichment),
    /// Deterministic in-process backend for tests and demos
    Mock(MockEnrichment),
}

impl EnrichmentClient {
    /// Create a client from environment variables
    ///
    /// Returns None (tier disabled) when the `http` backend has no API key.
    pub fn from_env() -> Option<Self> {
        let backend =
            std::env::var("TALLY_ENRICHMENT_BACKEND").unwrap_or_else(|_| "http".to_string());

        match backend.to_lowercase().as_str() {
            "mock" => {
                info!("Using mock enrichment backend");
                Some(EnrichmentClient::Mock(MockEnrichment::new()))
            }
            "http" => Self::http_from_env(),
            other => {
                warn!(backend = %other, "Unknown TALLY_ENRICHMENT_BACKEND, falling back to http");
                Self::http_from_env()
            }
        }
    }

    fn http_from_env() -> Option<Self> {
        let client = HttpEnrichment::from_env().map(EnrichmentClient::Http);
        if client.is_none() {
            info!("TALLY_ENRICHMENT_API_KEY not set, external enrichment disabled");
        }
        client
    }

    pub fn http(url: &str, api_key: &str) -> Self {
        EnrichmentClient::Http(HttpEnrichment::new(url, api_key))
    }

    pub fn mock() -> Self {
        EnrichmentClient::Mock(MockEnrichment::new())
    }
}

/// Deadline override from `TALLY_ENRICHMENT_TIMEOUT_SECS`
pub fn timeout_from_env() -> Option<Duration> {
    let raw = std::env::var("TALLY_ENRICHMENT_TIMEOUT_SECS").ok()?;
    let timeout = parse_timeout_secs(&raw);
    if timeout.is_none() {
        warn!(value = %raw, "Ignoring invalid TALLY_ENRICHMENT_TIMEOUT_SECS");
    }
    timeout
}

/// Positive, representable seconds; anything else is `None`
fn parse_timeout_secs(raw: &str) -> Option<Duration> {
    let secs = raw.trim().parse::<f64>().ok()?;
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

#[async_trait]
impl EnrichmentBackend for EnrichmentClient {
    async fn enrich(&self, description: &str, amount: Option<f64>) -> Result<Option<Enrichment>> {
        match self {
            EnrichmentClient::Http(b) => b.enrich(description, amount).await,
            EnrichmentClient::Mock(b) => b.enrich(description, amount).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            EnrichmentClient::Http(b) => b.name(),
            EnrichmentClient::Mock(b) => b.name(),
        }
    }
}
