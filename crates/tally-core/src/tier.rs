//! Classification tiers
//!
//! Each tier either produces a final answer or declines. The orchestrator
//! asks them in order and stops at the first answer; the fallback is always
//! last and always answers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::category::{CategorizationResult, Category, Source, TransactionInput};
use crate::config::{
    DEFAULT_ENRICHMENT_TIMEOUT, EXTERNAL_ACCEPTANCE, FALLBACK_CONFIDENCE, RULE_CONFIDENCE,
    STATISTICAL_ACCEPTANCE,
};
use crate::enrichment::EnrichmentBackend;
use crate::error::{Error, Result};
use crate::keywords::KeywordMatcher;
use crate::rules::RuleClassifier;
use crate::statistical::StatisticalClassifier;

/// A classification tier
///
/// `Ok(None)` means "not my call, ask the next tier". Errors are logged by
/// the orchestrator and treated the same way.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Source stamped on every answer this tier gives
    fn source(&self) -> Source;

    /// Tier name (for logging)
    fn name(&self) -> &str;

    async fn try_classify(&self, input: &TransactionInput)
        -> Result<Option<CategorizationResult>>;

    /// Classify many inputs; one entry per input, in order
    async fn try_classify_batch(
        &self,
        inputs: &[TransactionInput],
    ) -> Vec<Result<Option<CategorizationResult>>> {
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            results.push(self.try_classify(input).await);
        }
        results
    }
}

/// Pattern rules: protected bills, merchants, payment rails
pub struct RuleTier {
    rules: Arc<RuleClassifier>,
    confidence: f64,
}

impl RuleTier {
    pub fn new(rules: Arc<RuleClassifier>) -> Self {
        Self {
            rules,
            confidence: RULE_CONFIDENCE,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

#[async_trait]
impl Classifier for RuleTier {
    fn source(&self) -> Source {
        Source::Rule
    }

    fn name(&self) -> &str {
        "rules"
    }

    async fn try_classify(
        &self,
        input: &TransactionInput,
    ) -> Result<Option<CategorizationResult>> {
        Ok(self
            .rules
            .classify(&input.description, input.original_category)
            .map(|m| {
                debug!(
                    description = %input.description,
                    category = %m.category,
                    reason = ?m.reason,
                    "Rule matched"
                );
                CategorizationResult::new(m.category, self.confidence, Source::Rule, m.explanation())
            }))
    }
}

/// External enrichment API with a per-call deadline
pub struct EnrichmentTier {
    backend: Arc<dyn EnrichmentBackend>,
    timeout: Duration,
    acceptance: f64,
}

impl EnrichmentTier {
    pub fn new(backend: Arc<dyn EnrichmentBackend>) -> Self {
        Self {
            backend,
            timeout: DEFAULT_ENRICHMENT_TIMEOUT,
            acceptance: EXTERNAL_ACCEPTANCE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Answers must score strictly above this
    pub fn with_acceptance(mut self, acceptance: f64) -> Self {
        self.acceptance = acceptance;
        self
    }
}

#[async_trait]
impl Classifier for EnrichmentTier {
    fn source(&self) -> Source {
        Source::External
    }

    fn name(&self) -> &str {
        "enrichment"
    }

    async fn try_classify(
        &self,
        input: &TransactionInput,
    ) -> Result<Option<CategorizationResult>> {
        let call = self.backend.enrich(&input.description, input.amount);
        let enrichment = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        let Some(enrichment) = enrichment else {
            return Ok(None);
        };

        let Some(category) = Category::parse_label(&enrichment.category) else {
            debug!(label = %enrichment.category, "Enrichment returned unknown category");
            return Ok(None);
        };

        if enrichment.confidence.is_nan() || enrichment.confidence <= self.acceptance {
            debug!(
                category = %category,
                confidence = enrichment.confidence,
                "Enrichment below acceptance threshold"
            );
            return Ok(None);
        }

        let explanation = match &enrichment.merchant_name {
            Some(name) => format!("External API categorized merchant '{}'", name),
            None => "External API categorization".to_string(),
        };

        Ok(Some(
            CategorizationResult::new(category, enrichment.confidence, Source::External, explanation)
                .with_merchant_name(enrichment.merchant_name),
        ))
    }
}

/// Trained model, accepted at or above a minimum probability
pub struct StatisticalTier {
    classifier: StatisticalClassifier,
    acceptance: f64,
}

impl StatisticalTier {
    pub fn new(classifier: StatisticalClassifier) -> Self {
        Self {
            classifier,
            acceptance: STATISTICAL_ACCEPTANCE,
        }
    }

    pub fn with_acceptance(mut self, acceptance: f64) -> Self {
        self.acceptance = acceptance;
        self
    }

    fn accept(&self, result: CategorizationResult) -> Option<CategorizationResult> {
        if result.confidence >= self.acceptance {
            Some(result)
        } else {
            debug!(
                category = %result.category,
                confidence = result.confidence,
                "Statistical prediction below acceptance threshold"
            );
            None
        }
    }
}

#[async_trait]
impl Classifier for StatisticalTier {
    fn source(&self) -> Source {
        Source::Statistical
    }

    fn name(&self) -> &str {
        "statistical"
    }

    async fn try_classify(
        &self,
        input: &TransactionInput,
    ) -> Result<Option<CategorizationResult>> {
        Ok(self
            .classifier
            .classify(&input.description)
            .and_then(|r| self.accept(r)))
    }

    async fn try_classify_batch(
        &self,
        inputs: &[TransactionInput],
    ) -> Vec<Result<Option<CategorizationResult>>> {
        if !self.classifier.is_available() {
            return inputs.iter().map(|_| Ok(None)).collect();
        }

        let descriptions: Vec<String> = inputs.iter().map(|i| i.description.clone()).collect();
        let results = self.classifier.classify_batch(&descriptions);
        if results.len() != inputs.len() {
            let err = format!(
                "Statistical batch returned {} results for {} inputs",
                results.len(),
                inputs.len()
            );
            return inputs.iter().map(|_| Err(Error::Model(err.clone()))).collect();
        }

        results.into_iter().map(|r| Ok(self.accept(r))).collect()
    }
}

/// Last resort: keyword matcher, then the catch-all
#[derive(Debug, Clone, Copy)]
pub struct Fallback {
    keywords: Option<KeywordMatcher>,
    confidence: f64,
}

impl Default for Fallback {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Fallback {
    pub fn new(use_keywords: bool) -> Self {
        Self {
            keywords: use_keywords.then(KeywordMatcher::new),
            confidence: FALLBACK_CONFIDENCE,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Always produces a result
    pub fn classify(&self, description: &str) -> CategorizationResult {
        let (category, explanation) = match &self.keywords {
            Some(matcher) => matcher.explain(description),
            None => (Category::CATCH_ALL, "Keyword fallback disabled".to_string()),
        };

        let explanation = if category.is_catch_all() {
            format!("{}; defaulting to {}", explanation, Category::CATCH_ALL)
        } else {
            explanation
        };

        CategorizationResult::new(category, self.confidence, Source::Fallback, explanation)
    }
}
