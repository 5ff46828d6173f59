//! Tally Core Library
//!
//! Transaction categorization for the Tally cash-flow dashboard:
//! - Closed category taxonomy with legacy label parsing
//! - Pattern rules for known merchants, protected bills and payment rails
//! - Optional external enrichment API with a per-call deadline
//! - TF-IDF + logistic regression model, trainable from labelled CSV
//! - Keyword fallback and a catch-all so every transaction gets an answer
//! - Demo accuracy modulation, correction analytics and store collaborators

pub mod analytics;
pub mod category;
pub mod config;
pub mod demo;
pub mod enrichment;
pub mod error;
pub mod keywords;
pub mod orchestrator;
pub mod rules;
pub mod statistical;
pub mod store;
pub mod tier;

/// Test utilities including mock enrichment server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use analytics::{
    AccuracyReport, CategorizationAnalytics, CorrectionRecord, PerformanceReport, RequestMetric,
};
pub use category::{CategorizationResult, Category, Source, TransactionInput};
pub use config::{CategorizerConfig, Thresholds};
pub use demo::{DemoAccuracyReport, DemoCategorizer, DemoModulator, DemoResult};
pub use enrichment::{
    Enrichment, EnrichmentBackend, EnrichmentClient, HttpEnrichment, MockEnrichment,
};
pub use error::{Error, Result};
pub use keywords::KeywordMatcher;
pub use orchestrator::{Categorizer, CategorizerBuilder};
pub use rules::{RuleClassifier, RuleMatch, RuleReason};
pub use statistical::{
    ClassifierModel, ModelTrainer, StatisticalClassifier, TrainingConfig, TrainingData,
    TrainingExample, TrainingReport,
};
pub use store::{
    recategorize_month, CategoryOverrides, MemoryStore, RecategorizeOutcome, Transaction,
    TransactionFilter, TransactionStore,
};
pub use tier::{Classifier, EnrichmentTier, Fallback, RuleTier, StatisticalTier};
