//! Multinomial logistic regression and the persisted model artifact

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::vectorizer::{SparseVector, TfidfVectorizer};
use crate::category::Category;
use crate::error::{Error, Result};

/// Probability per category, in category order
pub type Distribution = BTreeMap<Category, f64>;

/// Linear classifier: `scores = coef · x + intercept`, then softmax
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// Class labels, one per coefficient row
    pub classes: Vec<String>,
    /// `classes.len()` rows of `num_features` weights
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl LinearModel {
    pub fn validate(&self, num_features: usize) -> Result<()> {
        if self.classes.is_empty() {
            return Err(Error::Model("Model has no classes defined".to_string()));
        }
        if self.coef.len() != self.classes.len() || self.intercept.len() != self.classes.len() {
            return Err(Error::Model(format!(
                "Shape mismatch: {} classes, {} coefficient rows, {} intercepts",
                self.classes.len(),
                self.coef.len(),
                self.intercept.len()
            )));
        }
        if let Some(row) = self.coef.iter().position(|r| r.len() != num_features) {
            return Err(Error::Model(format!(
                "Coefficient row {} has {} weights, expected {}",
                row,
                self.coef[row].len(),
                num_features
            )));
        }
        Ok(())
    }

    /// Raw class scores for a sparse input
    pub fn decision_function(&self, x: &SparseVector) -> Vec<f64> {
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, b)| {
                x.iter()
                    .map(|&(j, v)| row.get(j).copied().unwrap_or(0.0) * v)
                    .sum::<f64>()
                    + b
            })
            .collect()
    }

    /// Class probabilities for a sparse input
    pub fn predict_proba(&self, x: &SparseVector) -> Vec<f64> {
        softmax(&self.decision_function(x))
    }
}

/// Numerically stable softmax
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// On-disk JSON layout
#[derive(Serialize)]
struct ArtifactRef<'a> {
    vectorizer: &'a TfidfVectorizer,
    classifier: &'a LinearModel,
}

#[derive(Deserialize)]
struct RawArtifact {
    vectorizer: TfidfVectorizer,
    classifier: LinearModel,
}

/// A trained vectorizer + classifier pair
///
/// Class labels are mapped onto [`Category`] once at construction. Labels
/// outside the taxonomy fold into the catch-all.
#[derive(Debug, Clone)]
pub struct ClassifierModel {
    vectorizer: TfidfVectorizer,
    classifier: LinearModel,
    /// Category of each class row
    class_categories: Vec<Category>,
    feature_names: Vec<String>,
}

impl ClassifierModel {
    pub fn new(vectorizer: TfidfVectorizer, classifier: LinearModel) -> Result<Self> {
        vectorizer.validate()?;
        classifier.validate(vectorizer.num_features())?;

        let class_categories = classifier
            .classes
            .iter()
            .map(|label| {
                Category::parse_label(label).unwrap_or_else(|| {
                    warn!(label = %label, "Unknown model class, folding into catch-all");
                    Category::CATCH_ALL
                })
            })
            .collect();
        let feature_names = vectorizer.feature_names();

        Ok(Self {
            vectorizer,
            classifier,
            class_categories,
            feature_names,
        })
    }

    /// Load the JSON artifact `{ "vectorizer": ..., "classifier": ... }`
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "Model file not found: {}",
                path.display()
            )));
        }
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawArtifact = serde_json::from_str(json)?;
        Self::new(raw.vectorizer, raw.classifier)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&ArtifactRef {
            vectorizer: &self.vectorizer,
            classifier: &self.classifier,
        })?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    pub fn classifier(&self) -> &LinearModel {
        &self.classifier
    }

    /// Distinct categories the model can predict
    pub fn categories(&self) -> Vec<Category> {
        let mut categories = self.class_categories.clone();
        categories.sort();
        categories.dedup();
        categories
    }

    pub fn transform(&self, description: &str) -> SparseVector {
        self.vectorizer.transform(description)
    }

    /// Category distribution for an already-vectorized description
    pub fn distribution(&self, x: &SparseVector) -> Distribution {
        let mut dist = Distribution::new();
        for (category, p) in self
            .class_categories
            .iter()
            .zip(self.classifier.predict_proba(x))
        {
            *dist.entry(*category).or_insert(0.0) += p;
        }
        dist
    }

    pub fn predict_proba(&self, description: &str) -> Distribution {
        self.distribution(&self.transform(description))
    }

    pub fn predict_proba_batch(&self, descriptions: &[&str]) -> Vec<Distribution> {
        self.vectorizer
            .transform_batch(descriptions)
            .iter()
            .map(|x| self.distribution(x))
            .collect()
    }

    /// Terms contributing most to `category`, largest `|weight × value|` first
    pub fn top_features(&self, x: &SparseVector, category: Category, limit: usize) -> Vec<&str> {
        let rows: Vec<&Vec<f64>> = self
            .class_categories
            .iter()
            .zip(&self.classifier.coef)
            .filter(|(c, _)| **c == category)
            .map(|(_, row)| row)
            .collect();

        let mut contributions: Vec<(usize, f64)> = x
            .iter()
            .filter(|(_, v)| *v > 0.0)
            .map(|&(j, v)| {
                let weight: f64 = rows.iter().map(|r| r.get(j).copied().unwrap_or(0.0)).sum();
                (j, weight * v)
            })
            .collect();

        contributions.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then(a.0.cmp(&b.0)));

        contributions
            .into_iter()
            .take(limit)
            .filter_map(|(j, _)| self.feature_names.get(j).map(String::as_str))
            .collect()
    }
}
