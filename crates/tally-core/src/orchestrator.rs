//! Categorization orchestrator
//!
//! Runs the tiers in a fixed order and returns the first answer:
//!
//! 1. Pattern rules (protected bills, known merchants, payment rails)
//! 2. External enrichment API, when configured
//! 3. Statistical model, when an artifact is loaded
//! 4. Keyword fallback / catch-all
//!
//! A tier that errors, times out or declines is logged and skipped.
//! Categorization itself never fails: every input gets a result.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::category::{CategorizationResult, Category, TransactionInput};
use crate::config::CategorizerConfig;
use crate::enrichment::{self, EnrichmentBackend, EnrichmentClient};
use crate::error::Result;
use crate::rules::RuleClassifier;
use crate::statistical::StatisticalClassifier;
use crate::tier::{Classifier, EnrichmentTier, Fallback, RuleTier, StatisticalTier};

/// Ordered tier chain with a total fallback
pub struct Categorizer {
    tiers: Vec<Box<dyn Classifier>>,
    fallback: Fallback,
}

impl Categorizer {
    pub fn builder() -> CategorizerBuilder {
        CategorizerBuilder::default()
    }

    /// Assemble the full chain from configuration and the environment
    ///
    /// Rules come from `rules_path` (or the data-dir override / embedded
    /// table), the model from `config.model_path`, and the enrichment client
    /// from `TALLY_ENRICHMENT_*` variables. Missing optional tiers are logged
    /// and skipped.
    pub fn from_config(config: CategorizerConfig, rules_path: Option<&Path>) -> Result<Self> {
        let rules = Arc::new(RuleClassifier::load(rules_path)?);

        let statistical = match &config.model_path {
            Some(path) => StatisticalClassifier::load(path),
            None => {
                info!("No model path configured, statistical tier disabled");
                StatisticalClassifier::disabled()
            }
        };

        let mut config = config;
        if let Some(timeout) = enrichment::timeout_from_env() {
            config.enrichment_timeout = timeout;
        }

        let mut builder = Self::builder()
            .config(config)
            .rules(rules)
            .statistical(statistical);
        if let Some(client) = EnrichmentClient::from_env() {
            builder = builder.enrichment(Arc::new(client));
        }

        builder.build()
    }

    /// Names of the active tiers, in order (fallback excluded)
    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Categorize one description
    ///
    /// `original_category` is parsed leniently: spellings outside the
    /// taxonomy are treated as absent.
    pub async fn categorize(
        &self,
        description: &str,
        amount: Option<f64>,
        original_category: Option<&str>,
    ) -> CategorizationResult {
        let input = TransactionInput::new(description)
            .with_amount(amount)
            .with_original_category(parse_original(original_category));
        self.categorize_input(&input).await
    }

    pub async fn categorize_input(&self, input: &TransactionInput) -> CategorizationResult {
        for tier in &self.tiers {
            match tier.try_classify(input).await {
                Ok(Some(mut result)) => {
                    result.source = tier.source();
                    debug!(
                        tier = tier.name(),
                        source = %result.source,
                        category = %result.category,
                        confidence = result.confidence,
                        "Categorized"
                    );
                    return result;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(tier = tier.name(), description = %input.description, "Tier failed: {}", e);
                }
            }
        }

        self.fallback.classify(&input.description)
    }

    /// Categorize many descriptions
    ///
    /// Output length and order match `descriptions`. When
    /// `original_categories` has a different length it is ignored.
    pub async fn categorize_batch(
        &self,
        descriptions: &[String],
        original_categories: Option<&[String]>,
    ) -> Vec<CategorizationResult> {
        let originals = match original_categories {
            Some(cats) if cats.len() != descriptions.len() => {
                warn!(
                    descriptions = descriptions.len(),
                    categories = cats.len(),
                    "Original category count mismatch, ignoring original categories"
                );
                None
            }
            other => other,
        };

        let inputs: Vec<TransactionInput> = descriptions
            .iter()
            .enumerate()
            .map(|(i, description)| {
                let original = originals.and_then(|cats| parse_original(Some(cats[i].as_str())));
                TransactionInput::new(description.as_str()).with_original_category(original)
            })
            .collect();

        self.categorize_inputs(&inputs).await
    }

    /// Categorize one month's worth of descriptions
    pub async fn categorize_month(
        &self,
        descriptions: &[String],
        original_categories: Option<&[String]>,
    ) -> Vec<CategorizationResult> {
        self.categorize_batch(descriptions, original_categories).await
    }

    /// Batch path: each tier sees every row still open, once
    pub async fn categorize_inputs(&self, inputs: &[TransactionInput]) -> Vec<CategorizationResult> {
        let mut resolved: Vec<Option<CategorizationResult>> = vec![None; inputs.len()];

        for tier in &self.tiers {
            let open: Vec<usize> = (0..inputs.len()).filter(|&i| resolved[i].is_none()).collect();
            if open.is_empty() {
                break;
            }

            let batch: Vec<TransactionInput> = open.iter().map(|&i| inputs[i].clone()).collect();
            let outcomes = tier.try_classify_batch(&batch).await;

            let mut accepted = 0;
            for (&i, outcome) in open.iter().zip(outcomes) {
                match outcome {
                    Ok(Some(mut result)) => {
                        result.source = tier.source();
                        resolved[i] = Some(result);
                        accepted += 1;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(
                            tier = tier.name(),
                            description = %inputs[i].description,
                            "Tier failed: {}",
                            e
                        );
                    }
                }
            }
            debug!(
                tier = tier.name(),
                source = %tier.source(),
                open = open.len(),
                accepted,
                "Batch tier pass"
            );
        }

        resolved
            .into_iter()
            .zip(inputs)
            .map(|(result, input)| result.unwrap_or_else(|| self.fallback.classify(&input.description)))
            .collect()
    }
}

fn parse_original(label: Option<&str>) -> Option<Category> {
    let label = label?.trim();
    if label.is_empty() {
        return None;
    }
    let parsed = Category::parse_label(label);
    if parsed.is_none() {
        debug!(label, "Ignoring unknown original category");
    }
    parsed
}

/// Builder for [`Categorizer`]
#[derive(Default)]
pub struct CategorizerBuilder {
    config: Option<CategorizerConfig>,
    rules: Option<Arc<RuleClassifier>>,
    enrichment: Option<Arc<dyn EnrichmentBackend>>,
    statistical: Option<StatisticalClassifier>,
    extra_tiers: Vec<Box<dyn Classifier>>,
}

impl CategorizerBuilder {
    pub fn config(mut self, config: CategorizerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn rules(mut self, rules: Arc<RuleClassifier>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn enrichment(mut self, backend: Arc<dyn EnrichmentBackend>) -> Self {
        self.enrichment = Some(backend);
        self
    }

    pub fn statistical(mut self, classifier: StatisticalClassifier) -> Self {
        self.statistical = Some(classifier);
        self
    }

    /// Append a custom tier after the built-in ones (before the fallback)
    pub fn tier(mut self, tier: Box<dyn Classifier>) -> Self {
        self.extra_tiers.push(tier);
        self
    }

    /// Build the chain. Without explicit rules the embedded table is used.
    pub fn build(self) -> Result<Categorizer> {
        let config = self.config.unwrap_or_default();
        let thresholds = config.thresholds;

        let rules = match self.rules {
            Some(rules) => rules,
            None => Arc::new(RuleClassifier::embedded()?),
        };

        let mut tiers: Vec<Box<dyn Classifier>> = vec![Box::new(
            RuleTier::new(rules).with_confidence(thresholds.rule_confidence),
        )];

        if let Some(backend) = self.enrichment {
            info!(backend = backend.name(), "External enrichment enabled");
            tiers.push(Box::new(
                EnrichmentTier::new(backend)
                    .with_timeout(config.enrichment_timeout)
                    .with_acceptance(thresholds.external_acceptance),
            ));
        }

        if let Some(classifier) = self.statistical.filter(|c| c.is_available()) {
            tiers.push(Box::new(
                StatisticalTier::new(
                    classifier.with_alternate_threshold(thresholds.alternate_threshold),
                )
                .with_acceptance(thresholds.statistical_acceptance),
            ));
        }

        tiers.extend(self.extra_tiers);

        Ok(Categorizer {
            tiers,
            fallback: Fallback::new(config.keyword_fallback)
                .with_confidence(thresholds.fallback_confidence),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Source;
    use crate::config::{FALLBACK_CONFIDENCE, RULE_CONFIDENCE};
    use crate::enrichment::MockEnrichment;
    use crate::statistical::model::tests::toy_model;
    use crate::statistical::{ClassifierModel, LinearModel, TfidfVectorizer};
    use crate::statistical::vectorizer::Norm;
    use std::time::Duration;

    fn config_without_model() -> CategorizerConfig {
        CategorizerConfig {
            model_path: None,
            ..CategorizerConfig::default()
        }
    }

    fn rules_only() -> Categorizer {
        Categorizer::builder()
            .config(config_without_model())
            .build()
            .unwrap()
    }

    /// Model that calls everything with "starbucks" transportation
    fn contrary_model() -> StatisticalClassifier {
        let vectorizer = TfidfVectorizer {
            vocabulary: [("starbucks".to_string(), 0), ("seattle".to_string(), 1)]
                .into_iter()
                .collect(),
            idf: vec![1.0, 1.0],
            ngram_range: (1, 1),
            lowercase: true,
            stop_words: Vec::new(),
            sublinear_tf: false,
            norm: Norm::L2,
        };
        let classifier = LinearModel {
            classes: vec!["dining".into(), "transportation".into()],
            coef: vec![vec![-5.0, 0.0], vec![5.0, 0.0]],
            intercept: vec![0.0, 0.0],
        };
        StatisticalClassifier::from_model(Arc::new(
            ClassifierModel::new(vectorizer, classifier).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_totality() {
        let categorizer = rules_only();
        let long = "A".repeat(10_000);
        for input in ["", "   ", "12345 !!! ###", long.as_str(), "ÜBER CAFÉ ☕", "\n\t"] {
            let result = categorizer.categorize(input, None, None).await;
            assert!(Category::all().contains(&result.category));
            assert!((0.0..=1.0).contains(&result.confidence));
        }
    }

    #[tokio::test]
    async fn test_starbucks_scenario() {
        let result = rules_only()
            .categorize("Starbucks Coffee Seattle", None, None)
            .await;
        assert_eq!(result.category, Category::Dining);
        assert_eq!(result.source, Source::Rule);
        assert_eq!(result.confidence, RULE_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_unrecognized_vendor_scenario() {
        let result = rules_only()
            .categorize("XYZ9182 UNRECOGNIZED VENDOR", None, None)
            .await;
        assert_eq!(result.category, Category::Personal);
        assert_eq!(result.source, Source::Fallback);
        assert_eq!(result.confidence, FALLBACK_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_rules_beat_a_contrary_model() {
        let categorizer = Categorizer::builder()
            .config(config_without_model())
            .statistical(contrary_model())
            .build()
            .unwrap();
        assert_eq!(categorizer.tier_names(), vec!["rules", "statistical"]);

        let result = categorizer
            .categorize("STARBUCKS SEATTLE", None, None)
            .await;
        assert_eq!(result.source, Source::Rule);
        assert_eq!(result.category, Category::Dining);
    }

    #[tokio::test]
    async fn test_bill_preservation() {
        let result = rules_only()
            .categorize("ACME PROPERTY 4471", Some(42.0), Some("utilities"))
            .await;
        assert_eq!(result.category, Category::Utilities);
        assert_eq!(result.source, Source::Rule);

        // Display spellings are parsed too
        let result = rules_only()
            .categorize("ACME PROPERTY 4471", None, Some("Bills & Utilities"))
            .await;
        assert_eq!(result.category, Category::Utilities);
    }

    #[tokio::test]
    async fn test_unknown_original_category_is_ignored() {
        let result = rules_only()
            .categorize("ZELLE TO J SMITH", None, Some("spaceships"))
            .await;
        assert_eq!(result.category, Category::Personal);
        assert_eq!(result.source, Source::Rule);
    }

    #[tokio::test]
    async fn test_missing_model_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let categorizer = Categorizer::builder()
            .config(config_without_model())
            .statistical(StatisticalClassifier::load(&dir.path().join("missing.json")))
            .build()
            .unwrap();
        assert_eq!(categorizer.tier_names(), vec!["rules"]);

        let result = categorizer
            .categorize("random text with no patterns", None, None)
            .await;
        assert_eq!(result.source, Source::Fallback);
        assert_eq!(result.category, Category::Personal);
    }

    #[tokio::test]
    async fn test_keyword_fallback() {
        let result = rules_only()
            .categorize("Annual membership renewal", None, None)
            .await;
        assert_eq!(result.category, Category::Subscriptions);
        assert_eq!(result.source, Source::Fallback);

        let plain = Categorizer::builder()
            .config(CategorizerConfig {
                keyword_fallback: false,
                ..config_without_model()
            })
            .build()
            .unwrap()
            .categorize("Annual membership renewal", None, None)
            .await;
        assert_eq!(plain.category, Category::Personal);
    }

    #[tokio::test]
    async fn test_enrichment_before_model() {
        let categorizer = Categorizer::builder()
            .config(config_without_model())
            .enrichment(Arc::new(MockEnrichment::new()))
            .statistical(StatisticalClassifier::from_model(Arc::new(toy_model())))
            .build()
            .unwrap();
        assert_eq!(
            categorizer.tier_names(),
            vec!["rules", "enrichment", "statistical"]
        );

        // Known to both; rules go first
        let result = categorizer.categorize("NETFLIX.COM", None, None).await;
        assert_eq!(result.source, Source::Rule);

        // Not a rule merchant; the mock API knows it

        let result = categorizer.categorize("ACE HARDWARE 0042 latte", None, None).await;
        assert_eq!(result.source, Source::External);
        assert_eq!(result.category, Category::Maintenance);
        assert_eq!(result.merchant_name.as_deref(), Some("Ace Hardware"));

        // Unknown to the API; the model takes it
        let result = categorizer.categorize("latte", None, None).await;
        assert_eq!(result.source, Source::Statistical);
        assert_eq!(result.category, Category::Dining);
    }

    #[tokio::test]
    async fn test_enrichment_failures_fall_through() {
        for backend in [
            MockEnrichment::failing(),
            MockEnrichment::new().with_delay(Duration::from_millis(200)),
        ] {
            let categorizer = Categorizer::builder()
                .config(CategorizerConfig {
                    enrichment_timeout: Duration::from_millis(20),
                    ..config_without_model()
                })
                .enrichment(Arc::new(backend))
                .build()
                .unwrap();

            let result = categorizer.categorize("ACE HARDWARE 0042", None, None).await;
            assert_eq!(result.source, Source::Fallback);
        }
    }

    #[tokio::test]
    async fn test_low_confidence_enrichment_ignored() {
        let backend = MockEnrichment::empty().with_entry("ACME", "Dining", 0.6, "Acme");
        let categorizer = Categorizer::builder()
            .config(config_without_model())
            .enrichment(Arc::new(backend))
            .build()
            .unwrap();
        let result = categorizer.categorize("ACME 123", None, None).await;
        assert_eq!(result.source, Source::Fallback);
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let categorizer = Categorizer::builder()
            .config(config_without_model())
            .enrichment(Arc::new(MockEnrichment::new()))
            .statistical(StatisticalClassifier::from_model(Arc::new(toy_model())))
            .build()
            .unwrap();

        let descriptions: Vec<String> = [
            "Starbucks Coffee Seattle",
            "ACE HARDWARE 0042",
            "latte",
            "shell fuel",
            "XYZ9182 UNRECOGNIZED VENDOR",
            "ZELLE TO J SMITH",
            "",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let originals: Vec<String> = ["", "", "", "", "", "maintenance", ""]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let batch = categorizer
            .categorize_batch(&descriptions, Some(&originals))
            .await;
        assert_eq!(batch.len(), descriptions.len());

        for ((description, original), result) in descriptions.iter().zip(&originals).zip(&batch) {
            let single = categorizer
                .categorize(description, None, Some(original.as_str()))
                .await;
            assert_eq!(&single, result, "description: {}", description);
        }
        assert_eq!(batch[5].category, Category::Maintenance);
    }

    #[tokio::test]
    async fn test_bill_in_the_middle_of_a_batch() {
        let categorizer = rules_only();
        let descriptions: Vec<String> = ["QQQ LOCAL 1", "COMCAST CABLE COMM", "QQQ LOCAL 2"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let results = categorizer.categorize_month(&descriptions, None).await;
        assert_eq!(results[1].source, Source::Rule);
        assert_eq!(results[1].category, Category::Utilities);
        assert_eq!(results[0].source, Source::Fallback);
        assert_eq!(results[2].source, Source::Fallback);
    }

    #[tokio::test]
    async fn test_batch_length_mismatch_ignores_originals() {
        let categorizer = rules_only();
        let descriptions = vec!["ACME PROPERTY".to_string(), "QQQ".to_string()];
        let originals = vec!["utilities".to_string()];

        let results = categorizer
            .categorize_batch(&descriptions, Some(&originals))
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, Source::Fallback);
    }

    /// Custom tier that answers Education but mislabels its source
    struct MislabelledTier;

    #[async_trait::async_trait]
    impl Classifier for MislabelledTier {
        fn source(&self) -> Source {
            Source::External
        }

        fn name(&self) -> &str {
            "mislabelled"
        }

        async fn try_classify(
            &self,
            _input: &TransactionInput,
        ) -> Result<Option<CategorizationResult>> {
            Ok(Some(CategorizationResult::new(
                Category::Education,
                0.9,
                Source::Fallback,
                "custom",
            )))
        }
    }

    #[tokio::test]
    async fn test_result_source_is_the_answering_tier() {
        let categorizer = Categorizer::builder()
            .config(config_without_model())
            .tier(Box::new(MislabelledTier))
            .build()
            .unwrap();

        let single = categorizer.categorize("XYZ9182 VENDOR", None, None).await;
        assert_eq!(single.category, Category::Education);
        assert_eq!(single.source, Source::External);

        let batch = categorizer
            .categorize_batch(&["XYZ9182 VENDOR".to_string()], None)
            .await;
        assert_eq!(batch[0].source, Source::External);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        assert!(rules_only().categorize_batch(&[], None).await.is_empty());
    }
}
