//! TF-IDF text vectorizer
//!
//! Reproduces the transform of a fitted scikit-learn `TfidfVectorizer` with
//! its default analyzer: lowercase, tokens matching `\b\w\w+\b`, stop-word
//! removal, word n-grams joined by a single space, raw counts scaled by IDF
//! and L2-normalized. Terms outside the fitted vocabulary are dropped.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default token pattern (two or more word characters)
static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("valid regex"));

/// Common English function words dropped before n-gram construction
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Row normalization applied after IDF weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    #[default]
    L2,
    None,
}

/// Sparse feature vector: `(feature index, weight)` sorted by index
pub type SparseVector = Vec<(usize, f64)>;

/// A fitted TF-IDF vectorizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Term → column index
    pub vocabulary: HashMap<String, usize>,
    /// Inverse document frequency per column
    pub idf: Vec<f64>,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default)]
    pub stop_words: Vec<String>,
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default)]
    pub norm: Norm,
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_true() -> bool {
    true
}

impl TfidfVectorizer {
    /// Number of feature columns
    pub fn num_features(&self) -> usize {
        self.idf.len()
    }

    /// Check internal consistency of a deserialized vectorizer
    pub fn validate(&self) -> Result<()> {
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(Error::Model(format!(
                "Invalid ngram_range ({}, {})",
                min_n, max_n
            )));
        }

        if let Some((term, idx)) = self
            .vocabulary
            .iter()
            .find(|(_, idx)| **idx >= self.idf.len())
        {
            return Err(Error::Model(format!(
                "Vocabulary term '{}' points at column {} but idf has {} entries",
                term,
                idx,
                self.idf.len()
            )));
        }

        Ok(())
    }

    /// Column names ordered by index
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = vec![String::new(); self.idf.len()];
        for (term, &idx) in &self.vocabulary {
            if let Some(slot) = names.get_mut(idx) {
                slot.clone_from(term);
            }
        }
        names
    }

    /// Analyze a document into its terms (tokens and n-grams)
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let tokens: Vec<&str> = TOKEN_PATTERN
            .find_iter(&text)
            .map(|m| m.as_str())
            .filter(|t| !self.stop_words.iter().any(|s| s == t))
            .collect();

        word_ngrams(&tokens, self.ngram_range)
    }

    /// Transform one document into a normalized sparse vector
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in self.analyze(text) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(idx, tf)| {
                let tf = if self.sublinear_tf { 1.0 + tf.ln() } else { tf };
                (idx, tf * self.idf.get(idx).copied().unwrap_or(0.0))
            })
            .collect();

        normalize(&mut vector, self.norm);
        vector
    }

    pub fn transform_batch(&self, texts: &[&str]) -> Vec<SparseVector> {
        texts.iter().map(|t| self.transform(t)).collect()
    }
}

/// Build n-grams in scikit-learn order: all n-grams of size `min`, then `min + 1`, ...
fn word_ngrams(tokens: &[&str], (min_n, max_n): (usize, usize)) -> Vec<String> {
    let mut terms = Vec::new();
    for n in min_n..=max_n {
        if n == 0 || n > tokens.len() {
            continue;
        }
        for window in tokens.windows(n) {
            terms.push(window.join(" "));
        }
    }
    terms
}

fn normalize(vector: &mut SparseVector, norm: Norm) {
    let total = match norm {
        Norm::L1 => vector.iter().map(|(_, v)| v.abs()).sum::<f64>(),
        Norm::L2 => vector.iter().map(|(_, v)| v * v).sum::<f64>().sqrt(),
        Norm::None => return,
    };

    if total > 0.0 {
        for (_, v) in vector.iter_mut() {
            *v /= total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectorizer() -> TfidfVectorizer {
        let vocabulary = [("coffee", 0), ("shop", 1), ("coffee shop", 2), ("gas", 3)]
            .into_iter()
            .map(|(t, i)| (t.to_string(), i))
            .collect();

        TfidfVectorizer {
            vocabulary,
            idf: vec![1.5, 2.0, 2.5, 1.0],
            ngram_range: (1, 2),
            lowercase: true,
            stop_words: vec!["the".to_string()],
            sublinear_tf: false,
            norm: Norm::L2,
        }
    }

    #[test]
    fn test_analyze_tokens_and_bigrams() {
        let v = vectorizer();
        assert_eq!(
            v.analyze("The Coffee Shop #12"),
            vec!["coffee", "shop", "12", "coffee shop", "shop 12"]
        );
        // Single-character tokens never match the token pattern
        assert!(v.analyze("a b c").is_empty());
    }

    #[test]
    fn test_transform_is_l2_normalized() {
        let v = vectorizer();
        let x = v.transform("COFFEE SHOP");
        assert_eq!(x.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2]);

        let norm: f64 = x.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);

        // Relative weights follow idf when counts are equal
        assert!(x[2].1 > x[1].1 && x[1].1 > x[0].1);
    }

    #[test]
    fn test_unknown_text_is_empty_vector() {
        let v = vectorizer();
        assert!(v.transform("zzz qqq").is_empty());
        assert!(v.transform("").is_empty());
    }

    #[test]
    fn test_sublinear_tf() {
        let mut v = vectorizer();
        v.norm = Norm::None;
        assert_eq!(v.transform("gas gas gas"), vec![(3, 3.0)]);

        v.sublinear_tf = true;
        let x = v.transform("gas gas gas");
        assert!((x[0].1 - (1.0 + 3f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn test_validate() {
        let mut v = vectorizer();
        assert!(v.validate().is_ok());

        v.vocabulary.insert("broken".to_string(), 99);
        assert!(v.validate().is_err());

        let mut v = vectorizer();
        v.ngram_range = (2, 1);
        assert!(v.validate().is_err());
    }

    #[test]
    fn test_feature_names() {
        assert_eq!(
            vectorizer().feature_names(),
            vec!["coffee", "shop", "coffee shop", "gas"]
        );
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{"vocabulary": {"uber": 0}, "idf": [1.0]}"#;
        let v: TfidfVectorizer = serde_json::from_str(json).unwrap();
        assert_eq!(v.ngram_range, (1, 1));
        assert!(v.lowercase);
        assert_eq!(v.norm, Norm::L2);
        assert_eq!(v.transform("UBER"), vec![(0, 1.0)]);
    }
}
