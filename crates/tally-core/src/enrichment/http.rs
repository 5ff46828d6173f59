//! HTTP enrichment backend
//!
//! Posts one transaction per request:
//!
//! ```json
//! {"transactions": [{"description": "...", "amount": 12.5, "currency": "USD"}]}
//! ```
//!
//! and reads the first entry of the response's `data` array
//! (`category_name`, `clean_description`, optional `confidence`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Enrichment, EnrichmentBackend};
use crate::error::{Error, Result};

/// Endpoint used when `TALLY_ENRICHMENT_URL` is not set
pub const DEFAULT_ENRICHMENT_URL: &str = "https://api.genify.ai/v1/categorize";

/// Confidence assumed when the service omits one
const DEFAULT_API_CONFIDENCE: f64 = 0.9;

/// Amount sent when the transaction has none
const PLACEHOLDER_AMOUNT: f64 = 1.0;

#[derive(Clone)]
pub struct HttpEnrichment {
    http_client: Client,
    url: String,
    api_key: String,
}

impl HttpEnrichment {
    pub fn new(url: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Create from environment variables
    ///
    /// Required: `TALLY_ENRICHMENT_API_KEY`
    /// Optional: `TALLY_ENRICHMENT_URL` (default: [`DEFAULT_ENRICHMENT_URL`])
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("TALLY_ENRICHMENT_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())?;
        let url = std::env::var("TALLY_ENRICHMENT_URL")
            .unwrap_or_else(|_| DEFAULT_ENRICHMENT_URL.to_string());
        Some(Self::new(&url, &api_key))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Serialize)]
struct EnrichRequest<'a> {
    transactions: [TransactionPayload<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TransactionPayload<'a> {
    description: &'a str,
    amount: f64,
    currency: &'static str,
}

#[derive(Debug, Deserialize)]
struct EnrichResponse {
    #[serde(default)]
    data: Vec<EnrichedTransaction>,
}

#[derive(Debug, Deserialize)]
struct EnrichedTransaction {
    category_name: Option<String>,
    clean_description: Option<String>,
    confidence: Option<f64>,
}

/// Parse a response body into the first enrichment, if any
pub(crate) fn parse_response(body: &str) -> Result<Option<Enrichment>> {
    let response: EnrichResponse = serde_json::from_str(body)
        .map_err(|e| Error::InvalidData(format!("Malformed enrichment response: {}", e)))?;

    let Some(first) = response.data.into_iter().next() else {
        return Ok(None);
    };

    let Some(category) = first.category_name.filter(|c| !c.trim().is_empty()) else {
        return Ok(None);
    };

    Ok(Some(Enrichment {
        category,
        confidence: first.confidence.unwrap_or(DEFAULT_API_CONFIDENCE),
        merchant_name: first.clean_description.filter(|n| !n.trim().is_empty()),
    }))
}

#[async_trait]
impl EnrichmentBackend for HttpEnrichment {
    async fn enrich(&self, description: &str, amount: Option<f64>) -> Result<Option<Enrichment>> {
        let request = EnrichRequest {
            transactions: [TransactionPayload {
                description,
                amount: amount.unwrap_or(PLACEHOLDER_AMOUNT),
                currency: "USD",
            }],
        };

        let response = self
            .http_client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        debug!("Enrichment response: {}", body);

        parse_response(&body)
    }

    fn name(&self) -> &str {
        "http"
    }
}
