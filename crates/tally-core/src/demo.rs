//! Demo accuracy modulation
//!
//! For product demos the dashboard shows a categorizer that is right about
//! as often as a real one would be. [`DemoCategorizer`] wraps a real
//! [`Categorizer`] and swaps some answers for plausible mistakes.
//!
//! The swap is deterministic: the draw is seeded by a SHA-256 of the correct
//! category's label, so a category is either always kept or always swapped
//! for a given target accuracy. Nothing here runs in the normal
//! categorization path.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::category::{CategorizationResult, Category, TransactionInput};
use crate::orchestrator::Categorizer;

/// Accuracy the demo aims for by default
pub const DEFAULT_TARGET_ACCURACY: f64 = 0.70;
/// Confidence reported for answers left unchanged
pub const DEMO_CONFIDENCE_CORRECT: f64 = 0.85;
/// Confidence reported for intentional mistakes
pub const DEMO_CONFIDENCE_PERTURBED: f64 = 0.65;

/// Mistakes a person could believe
fn plausible_confusions(category: Category) -> &'static [Category] {
    match category {
        Category::Dining => &[Category::Groceries, Category::Entertainment],
        Category::Groceries => &[Category::Dining, Category::Merchandise],
        Category::Merchandise => &[Category::Personal, Category::Entertainment],
        Category::Utilities => &[Category::Rent, Category::Maintenance],
        Category::Transportation => &[Category::Merchandise, Category::Personal],
        Category::Personal => &[],
        _ => &[Category::Personal],
    }
}

/// Deterministic per-category perturbation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemoModulator {
    target_accuracy: f64,
}

impl Default for DemoModulator {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_ACCURACY)
    }
}

impl DemoModulator {
    pub fn new(target_accuracy: f64) -> Self {
        Self {
            target_accuracy: target_accuracy.clamp(0.0, 1.0),
        }
    }

    pub fn target_accuracy(&self) -> f64 {
        self.target_accuracy
    }

    /// Return `correct` or a plausible wrong category
    pub fn perturb(&self, correct: Category) -> Category {
        perturb(correct, self.target_accuracy)
    }
}

/// Return `correct` or a plausible wrong category, deterministically
pub fn perturb(correct: Category, target_accuracy: f64) -> Category {
    let digest = Sha256::digest(correct.as_str().as_bytes());
    let (draw, pick) = digest.split_at(8);

    if unit_interval(draw) < target_accuracy {
        return correct;
    }

    let confusions = plausible_confusions(correct);
    if confusions.is_empty() {
        return correct;
    }
    let index = (u64_be(pick) % confusions.len() as u64) as usize;
    confusions[index]
}

fn u64_be(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .take(8)
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Map 8 bytes to [0, 1)
fn unit_interval(bytes: &[u8]) -> f64 {
    // top 53 bits fill an f64 mantissa exactly
    (u64_be(bytes) >> 11) as f64 / (1u64 << 53) as f64
}

/// Outcome of one demo categorization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemoResult {
    pub result: CategorizationResult,
    pub correct_category: Category,
    pub was_intentional_error: bool,
}

/// Summary over a demo batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemoAccuracyReport {
    pub total: usize,
    pub correct: usize,
    /// Percent, one decimal
    pub accuracy_percentage: f64,
    /// Percent, one decimal
    pub target_accuracy: f64,
    pub category_breakdown: BTreeMap<Category, usize>,
}

/// Decorates a [`Categorizer`] with demo accuracy modulation
pub struct DemoCategorizer {
    inner: Arc<Categorizer>,
    modulator: DemoModulator,
}

impl DemoCategorizer {
    pub fn new(inner: Arc<Categorizer>, modulator: DemoModulator) -> Self {
        Self { inner, modulator }
    }

    pub async fn categorize(
        &self,
        description: &str,
        amount: Option<f64>,
        original_category: Option<&str>,
    ) -> DemoResult {
        let result = self
            .inner
            .categorize(description, amount, original_category)
            .await;
        self.modulate(result)
    }

    pub async fn categorize_batch(&self, inputs: &[TransactionInput]) -> Vec<DemoResult> {
        self.inner
            .categorize_inputs(inputs)
            .await
            .into_iter()
            .map(|r| self.modulate(r))
            .collect()
    }

    pub async fn accuracy_report(&self, inputs: &[TransactionInput]) -> DemoAccuracyReport {
        let results = self.categorize_batch(inputs).await;
        self.report(&results)
    }

    /// Summarize results already produced by this categorizer
    pub fn report(&self, results: &[DemoResult]) -> DemoAccuracyReport {
        let total = results.len();
        let correct = results.iter().filter(|r| !r.was_intentional_error).count();
        let accuracy = if total > 0 {
            correct as f64 / total as f64
        } else {
            0.0
        };

        let mut category_breakdown = BTreeMap::new();
        for r in results {
            *category_breakdown.entry(r.result.category).or_insert(0) += 1;
        }

        DemoAccuracyReport {
            total,
            correct,
            accuracy_percentage: round1(accuracy * 100.0),
            target_accuracy: round1(self.modulator.target_accuracy() * 100.0),
            category_breakdown,
        }
    }

    fn modulate(&self, mut result: CategorizationResult) -> DemoResult {
        let correct_category = result.category;
        let shown = self.modulator.perturb(correct_category);
        let was_intentional_error = shown != correct_category;

        result.category = shown;
        if was_intentional_error {
            result.confidence = DEMO_CONFIDENCE_PERTURBED;
            result.explanation = format!("Categorized as {}", shown.display_name());
            result.alternates.clear();
        } else {
            result.confidence = DEMO_CONFIDENCE_CORRECT;
        }

        DemoResult {
            result,
            correct_category,
            was_intentional_error,
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategorizerConfig;

    fn demo(target: f64) -> DemoCategorizer {
        let categorizer = Categorizer::builder()
            .config(CategorizerConfig {
                model_path: None,
                ..CategorizerConfig::default()
            })
            .build()
            .unwrap();
        DemoCategorizer::new(Arc::new(categorizer), DemoModulator::new(target))
    }

    #[test]
    fn test_perturb_is_deterministic() {
        for category in Category::all() {
            for target in [0.0, 0.3, 0.7, 1.0] {
                assert_eq!(perturb(*category, target), perturb(*category, target));
            }
        }
    }

    #[test]
    fn test_full_accuracy_never_perturbs() {
        for category in Category::all() {
            assert_eq!(perturb(*category, 1.0), *category);
        }
    }

    #[test]
    fn test_zero_accuracy_uses_confusions() {
        for category in Category::all() {
            let shown = perturb(*category, 0.0);
            if category.is_catch_all() {
                assert_eq!(shown, *category);
            } else {
                assert_ne!(shown, *category);
                assert!(plausible_confusions(*category).contains(&shown));
            }
        }
    }

    #[test]
    fn test_unit_interval_range() {
        assert_eq!(unit_interval(&[0; 8]), 0.0);
        assert!(unit_interval(&[0xff; 8]) < 1.0);
    }

    #[test]
    fn test_target_is_clamped() {
        assert_eq!(DemoModulator::new(1.5).target_accuracy(), 1.0);
        assert_eq!(DemoModulator::new(-0.5).target_accuracy(), 0.0);
    }

    #[tokio::test]
    async fn test_demo_result_confidence() {
        let kept = demo(1.0).categorize("Starbucks Coffee Seattle", None, None).await;
        assert!(!kept.was_intentional_error);
        assert_eq!(kept.result.category, Category::Dining);
        assert_eq!(kept.result.confidence, DEMO_CONFIDENCE_CORRECT);

        let swapped = demo(0.0).categorize("Starbucks Coffee Seattle", None, None).await;
        assert!(swapped.was_intentional_error);
        assert_eq!(swapped.correct_category, Category::Dining);
        assert_ne!(swapped.result.category, Category::Dining);
        assert_eq!(swapped.result.confidence, DEMO_CONFIDENCE_PERTURBED);
    }

    #[tokio::test]
    async fn test_accuracy_report() {
        let inputs: Vec<TransactionInput> = [
            "Starbucks Coffee Seattle",
            "WHOLEFDS MKT 10234",
            "XYZ9182 UNRECOGNIZED VENDOR",
            "Shell Oil 5744",
        ]
        .into_iter()
        .map(TransactionInput::new)
        .collect();

        let report = demo(1.0).accuracy_report(&inputs).await;
        assert_eq!(report.total, 4);
        assert_eq!(report.correct, 4);
        assert_eq!(report.accuracy_percentage, 100.0);
        assert_eq!(report.target_accuracy, 100.0);
        assert_eq!(report.category_breakdown[&Category::Dining], 1);

        // Only the catch-all row survives a zero target
        let report = demo(0.0).accuracy_report(&inputs).await;
        assert_eq!(report.correct, 1);
        assert_eq!(report.accuracy_percentage, 25.0);
        assert_eq!(report.category_breakdown.values().sum::<usize>(), 4);

        let empty = demo(0.7).accuracy_report(&[]).await;
        assert_eq!(empty.total, 0);
        assert_eq!(empty.accuracy_percentage, 0.0);
    }
}
