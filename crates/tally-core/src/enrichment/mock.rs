//! Mock enrichment backend for testing
//!
//! Answers from a small substring table. A delay and a failure mode can be
//! configured to exercise the tier's deadline and error handling.

use std::time::Duration;

use async_trait::async_trait;

use super::{Enrichment, EnrichmentBackend};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
struct MockEntry {
    /// Uppercase substring to look for
    needle: String,
    category: String,
    confidence: f64,
    merchant_name: String,
}

/// Deterministic enrichment backend
#[derive(Debug, Clone)]
pub struct MockEnrichment {
    entries: Vec<MockEntry>,
    delay: Option<Duration>,
    fail: bool,
}

impl Default for MockEnrichment {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEnrichment {
    /// Mock with a few well-known merchants
    pub fn new() -> Self {
        Self::empty()
            .with_entry("NETFLIX", "Subscriptions", 0.95, "Netflix")
            .with_entry("SPOTIFY", "Subscriptions", 0.95, "Spotify")
            .with_entry("WHOLEFDS", "Groceries", 0.9, "Whole Foods")
            .with_entry("WHOLE FOODS", "Groceries", 0.9, "Whole Foods")
            .with_entry("AMAZON", "Shopping", 0.85, "Amazon")
            .with_entry("CHEVRON", "Gas & Automotive", 0.9, "Chevron")
            .with_entry("UBER", "Transport", 0.8, "Uber")
            .with_entry("ACE HARDWARE", "Home Maintenance", 0.88, "Ace Hardware")
            .with_entry("ZIPCAR", "Travel - Car Rentals", 0.91, "Zipcar")
    }

    /// Mock that knows nothing
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            delay: None,
            fail: false,
        }
    }

    /// Add a lookup entry; earlier entries win
    pub fn with_entry(
        mut self,
        needle: &str,
        category: &str,
        confidence: f64,
        merchant_name: &str,
    ) -> Self {
        self.entries.push(MockEntry {
            needle: needle.to_uppercase(),
            category: category.to_string(),
            confidence,
            merchant_name: merchant_name.to_string(),
        });
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every call
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl EnrichmentBackend for MockEnrichment {
    async fn enrich(&self, description: &str, _amount: Option<f64>) -> Result<Option<Enrichment>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail {
            return Err(Error::InvalidData("Mock enrichment failure".to_string()));
        }

        let upper = description.to_uppercase();
        Ok(self
            .entries
            .iter()
            .find(|e| upper.contains(&e.needle))
            .map(|e| Enrichment {
                category: e.category.clone(),
                confidence: e.confidence,
                merchant_name: Some(e.merchant_name.clone()),
            }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
