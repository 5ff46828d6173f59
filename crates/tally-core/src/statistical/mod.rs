//! Statistical classifier: TF-IDF features + multinomial logistic regression
//!
//! The model is an optional, read-only artifact. When it can't be loaded the
//! classifier stays disabled and every call returns nothing, leaving the
//! decision to the fallback tier.

pub mod model;
pub mod train;
pub mod vectorizer;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::category::{CategorizationResult, Category, Source};
use crate::config::ALTERNATE_THRESHOLD;

pub use model::{ClassifierModel, Distribution, LinearModel};
pub use train::{ModelTrainer, TrainingConfig, TrainingData, TrainingExample, TrainingReport};
pub use vectorizer::{Norm, SparseVector, TfidfVectorizer};

/// Number of features named in an explanation
const EXPLANATION_FEATURES: usize = 3;

/// Batch-oriented wrapper around an optional [`ClassifierModel`]
#[derive(Debug, Clone)]
pub struct StatisticalClassifier {
    model: Option<Arc<ClassifierModel>>,
    alternate_threshold: f64,
}

impl Default for StatisticalClassifier {
    fn default() -> Self {
        Self::disabled()
    }
}

impl StatisticalClassifier {
    /// A classifier with no model; always returns nothing
    pub fn disabled() -> Self {
        Self {
            model: None,
            alternate_threshold: ALTERNATE_THRESHOLD,
        }
    }

    pub fn from_model(model: Arc<ClassifierModel>) -> Self {
        Self {
            model: Some(model),
            alternate_threshold: ALTERNATE_THRESHOLD,
        }
    }

    /// Load the artifact at `path`; failures are logged and disable the tier
    pub fn load(path: &Path) -> Self {
        match ClassifierModel::load(path) {
            Ok(model) => {
                info!(
                    path = %path.display(),
                    classes = model.categories().len(),
                    features = model.vectorizer().num_features(),
                    "Loaded categorization model"
                );
                Self::from_model(Arc::new(model))
            }
            Err(e) => {
                warn!(path = %path.display(), "Statistical tier disabled: {}", e);
                Self::disabled()
            }
        }
    }

    pub fn with_alternate_threshold(mut self, threshold: f64) -> Self {
        self.alternate_threshold = threshold;
        self
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&Arc<ClassifierModel>> {
        self.model.as_ref()
    }

    /// Classify one description
    pub fn classify(&self, description: &str) -> Option<CategorizationResult> {
        self.classify_batch(&[description.to_string()]).pop()
    }

    /// Classify many descriptions with one vectorization pass.
    ///
    /// Returns one result per description, or an empty list when the
    /// model is unavailable.
    pub fn classify_batch(&self, descriptions: &[String]) -> Vec<CategorizationResult> {
        let Some(model) = &self.model else {
            return Vec::new();
        };

        let texts: Vec<&str> = descriptions.iter().map(String::as_str).collect();
        model
            .vectorizer()
            .transform_batch(&texts)
            .iter()
            .map(|x| self.result_for(model, x))
            .collect()
    }

    fn result_for(&self, model: &ClassifierModel, x: &SparseVector) -> CategorizationResult {
        let dist = model.distribution(x);
        let (category, confidence) = best(&dist);

        let alternates: Vec<(Category, f64)> = dist
            .iter()
            .filter(|(_, p)| **p > self.alternate_threshold)
            .map(|(c, p)| (*c, *p))
            .collect();

        let features = model.top_features(x, category, EXPLANATION_FEATURES);
        let explanation = if features.is_empty() {
            "No known terms; using class priors".to_string()
        } else {
            format!("Top features: {}", features.join(", "))
        };

        CategorizationResult::new(category, confidence, Source::Statistical, explanation)
            .with_alternates(alternates)
    }
}

/// Arg-max of a distribution; ties go to the earlier category
pub(crate) fn best(dist: &Distribution) -> (Category, f64) {
    dist.iter()
        .fold(None, |acc: Option<(Category, f64)>, (c, p)| match acc {
            Some((_, bp)) if *p <= bp => acc,
            _ => Some((*c, *p)),
        })
        .unwrap_or((Category::CATCH_ALL, 0.0))
}
