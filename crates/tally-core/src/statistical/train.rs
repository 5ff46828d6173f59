//! Model training from labelled descriptions
//!
//! Fits a TF-IDF vocabulary (english stop words, unigrams and bigrams,
//! capped at `max_features` terms) and a multinomial logistic regression by
//! full-batch gradient descent with L2 regularization. Weights start at zero
//! and rows are never shuffled, so the same input always produces the same
//! artifact.

use std::collections::{BTreeSet, HashMap};
use std::io::Read;

use serde::Serialize;
use tracing::{debug, info};

use super::best;
use super::model::{ClassifierModel, LinearModel};
use super::vectorizer::{Norm, SparseVector, TfidfVectorizer, ENGLISH_STOP_WORDS};
use crate::category::Category;
use crate::error::{Error, Result};

/// One labelled description
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub description: String,
    pub category: Category,
}

impl TrainingExample {
    pub fn new(description: impl Into<String>, category: Category) -> Self {
        Self {
            description: description.into(),
            category,
        }
    }
}

/// Trainer hyperparameters
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub max_features: usize,
    pub ngram_range: (usize, usize),
    pub epochs: usize,
    pub learning_rate: f64,
    /// L2 penalty on the coefficients (not the intercepts)
    pub l2: f64,
    /// Every `holdout_every`-th row goes to the test split (5 → 80/20)
    pub holdout_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_features: 2000,
            ngram_range: (1, 2),
            epochs: 500,
            learning_rate: 1.0,
            l2: 1e-3,
            holdout_every: 5,
        }
    }
}

/// Outcome of a training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub total_rows: usize,
    pub skipped_rows: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub classes: Vec<Category>,
    pub num_features: usize,
    pub train_accuracy: f64,
    /// `None` when the data set was too small to hold rows out
    pub test_accuracy: Option<f64>,
}

/// Labelled rows read from CSV
#[derive(Debug, Clone, Default)]
pub struct TrainingData {
    pub examples: Vec<TrainingExample>,
    /// Rows with an empty description or a label outside the taxonomy
    pub skipped: usize,
}

/// Fits [`ClassifierModel`]s
#[derive(Debug, Clone, Default)]
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Read `description` and `category` columns (other columns are ignored)
    pub fn read_csv<R: Read>(reader: R) -> Result<TrainingData> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| Error::InvalidData(format!("Missing '{}' column", name)))
        };
        let desc_col = column("description")?;
        let cat_col = column("category")?;

        let mut data = TrainingData::default();
        for record in rdr.records() {
            let record = record?;
            let description = record.get(desc_col).unwrap_or_default();
            let label = record.get(cat_col).unwrap_or_default();

            match Category::parse_label(label) {
                Some(category) if !description.is_empty() => {
                    data.examples.push(TrainingExample::new(description, category));
                }
                _ => {
                    debug!(description, label, "Skipping training row");
                    data.skipped += 1;
                }
            }
        }

        Ok(data)
    }

    /// Split, fit on the training rows and score both splits
    pub fn train(&self, data: &TrainingData) -> Result<(ClassifierModel, TrainingReport)> {
        let every = self.config.holdout_every;
        let (mut train, mut test) = (Vec::new(), Vec::new());
        for (i, example) in data.examples.iter().enumerate() {
            if every > 1 && data.examples.len() >= every && i % every == every - 1 {
                test.push(example.clone());
            } else {
                train.push(example.clone());
            }
        }

        let model = self.fit(&train)?;

        let report = TrainingReport {
            total_rows: data.examples.len() + data.skipped,
            skipped_rows: data.skipped,
            train_size: train.len(),
            test_size: test.len(),
            classes: model.categories(),
            num_features: model.vectorizer().num_features(),
            train_accuracy: accuracy(&model, &train),
            test_accuracy: (!test.is_empty()).then(|| accuracy(&model, &test)),
        };

        info!(
            train = report.train_size,
            test = report.test_size,
            features = report.num_features,
            train_accuracy = report.train_accuracy,
            test_accuracy = ?report.test_accuracy,
            "Trained categorization model"
        );

        Ok((model, report))
    }

    /// Fit a model on every example
    pub fn fit(&self, examples: &[TrainingExample]) -> Result<ClassifierModel> {
        let classes: Vec<Category> = examples
            .iter()
            .map(|e| e.category)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if classes.len() < 2 {
            return Err(Error::InvalidData(format!(
                "Training needs at least two categories, found {}",
                classes.len()
            )));
        }

        let docs: Vec<&str> = examples.iter().map(|e| e.description.as_str()).collect();
        let vectorizer = self.fit_vectorizer(&docs)?;
        let xs = vectorizer.transform_batch(&docs);
        let class_index: HashMap<Category, usize> =
            classes.iter().enumerate().map(|(i, c)| (*c, i)).collect();
        let ys: Vec<usize> = examples.iter().map(|e| class_index[&e.category]).collect();

        let (coef, intercept) =
            self.gradient_descent(&xs, &ys, classes.len(), vectorizer.num_features());

        let classifier = LinearModel {
            classes: classes.iter().map(|c| c.as_str().to_string()).collect(),
            coef,
            intercept,
        };

        ClassifierModel::new(vectorizer, classifier)
    }

    fn fit_vectorizer(&self, docs: &[&str]) -> Result<TfidfVectorizer> {
        let stop_words: Vec<String> = ENGLISH_STOP_WORDS.iter().map(|s| s.to_string()).collect();
        let analyzer = TfidfVectorizer {
            vocabulary: HashMap::new(),
            idf: Vec::new(),
            ngram_range: self.config.ngram_range,
            lowercase: true,
            stop_words,
            sublinear_tf: false,
            norm: Norm::L2,
        };
        analyzer.validate()?;

        // term -> (corpus count, document frequency)
        let mut stats: HashMap<String, (usize, usize)> = HashMap::new();
        for doc in docs {
            let terms = analyzer.analyze(doc);
            let unique: BTreeSet<&String> = terms.iter().collect();
            for term in &terms {
                stats.entry(term.clone()).or_default().0 += 1;
            }
            for term in unique {
                if let Some(entry) = stats.get_mut(term) {
                    entry.1 += 1;
                }
            }
        }

        if stats.is_empty() {
            return Err(Error::InvalidData(
                "Training descriptions contain no usable terms".to_string(),
            ));
        }

        let mut terms: Vec<(String, (usize, usize))> = stats.into_iter().collect();
        terms.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then_with(|| a.0.cmp(&b.0)));
        terms.truncate(self.config.max_features.max(1));
        terms.sort_by(|a, b| a.0.cmp(&b.0));

        let n_docs = docs.len() as f64;
        let mut vocabulary = HashMap::with_capacity(terms.len());
        let mut idf = Vec::with_capacity(terms.len());
        for (idx, (term, (_, df))) in terms.into_iter().enumerate() {
            vocabulary.insert(term, idx);
            idf.push(((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0);
        }

        Ok(TfidfVectorizer {
            vocabulary,
            idf,
            ..analyzer
        })
    }

    fn gradient_descent(
        &self,
        xs: &[SparseVector],
        ys: &[usize],
        n_classes: usize,
        n_features: usize,
    ) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut model = LinearModel {
            classes: vec![String::new(); n_classes],
            coef: vec![vec![0.0; n_features]; n_classes],
            intercept: vec![0.0; n_classes],
        };
        let n = xs.len().max(1) as f64;
        let lr = self.config.learning_rate;

        for epoch in 0..self.config.epochs {
            let mut grad_w = vec![vec![0.0; n_features]; n_classes];
            let mut grad_b = vec![0.0; n_classes];

            for (x, &y) in xs.iter().zip(ys) {
                let probs = model.predict_proba(x);
                for (k, p) in probs.into_iter().enumerate() {
                    let err = p - if k == y { 1.0 } else { 0.0 };
                    grad_b[k] += err;
                    for &(j, v) in x {
                        grad_w[k][j] += err * v;
                    }
                }
            }

            for k in 0..n_classes {
                for j in 0..n_features {
                    let w = &mut model.coef[k][j];
                    *w -= lr * (grad_w[k][j] / n + self.config.l2 * *w);
                }
                model.intercept[k] -= lr * grad_b[k] / n;
            }

            if epoch % 100 == 0 {
                debug!(epoch, "Gradient descent progress");
            }
        }

        (model.coef, model.intercept)
    }
}

/// Share of examples whose most probable category matches the label
fn accuracy(model: &ClassifierModel, examples: &[TrainingExample]) -> f64 {
    if examples.is_empty() {
        return 0.0;
    }
    let correct = examples
        .iter()
        .filter(|e| {
            let dist = model.predict_proba(&e.description);
            best(&dist).0 == e.category
        })
        .count();
    correct as f64 / examples.len() as f64
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn training_examples() -> Vec<TrainingExample> {
        [
            ("blue bottle latte", Category::Dining),
            ("corner bakery croissant", Category::Dining),
            ("joes diner breakfast", Category::Dining),
            ("latte and croissant downtown", Category::Dining),
            ("shell fuel station", Category::Transportation),
            ("chevron fuel pump", Category::Transportation),
            ("city parking garage", Category::Transportation),
            ("parking meter downtown", Category::Transportation),
            ("kroger grocery store", Category::Groceries),
            ("safeway grocery pickup", Category::Groceries),
            ("trader joes grocery", Category::Groceries),
            ("aldi grocery weekly", Category::Groceries),
        ]
        .into_iter()
        .map(|(d, c)| TrainingExample::new(d, c))
        .collect()
    }

    #[test]
    fn test_fit_classifies_training_rows() {
        let trainer = ModelTrainer::default();
        let examples = training_examples();
        let model = trainer.fit(&examples).unwrap();

        for example in &examples {
            let dist = model.predict_proba(&example.description);
            assert_eq!(
                best(&dist).0,
                example.category,
                "description: {}",
                example.description
            );
        }
        assert_eq!(
            model.categories(),
            vec![Category::Dining, Category::Groceries, Category::Transportation]
        );
    }

    #[test]
    fn test_fit_is_deterministic() {
        let trainer = ModelTrainer::default();
        let a = trainer.fit(&training_examples()).unwrap();
        let b = trainer.fit(&training_examples()).unwrap();
        assert_eq!(a.classifier(), b.classifier());
        assert_eq!(a.vectorizer(), b.vectorizer());
    }

    #[test]
    fn test_vocabulary_excludes_stop_words_and_respects_cap() {
        let trainer = ModelTrainer::new(TrainingConfig {
            max_features: 5,
            ..TrainingConfig::default()
        });
        let model = trainer.fit(&training_examples()).unwrap();
        let vocab = &model.vectorizer().vocabulary;
        assert_eq!(vocab.len(), 5);
        assert!(!vocab.contains_key("and"));
        // "grocery" is the most frequent term
        assert!(vocab.contains_key("grocery"));
    }

    #[test]
    fn test_single_class_is_rejected() {
        let examples = vec![
            TrainingExample::new("latte", Category::Dining),
            TrainingExample::new("espresso", Category::Dining),
        ];
        assert!(matches!(
            ModelTrainer::default().fit(&examples),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_train_split_and_report() {
        let data = TrainingData {
            examples: training_examples(),
            skipped: 1,
        };
        let (_, report) = ModelTrainer::default().train(&data).unwrap();
        assert_eq!(report.total_rows, 13);
        assert_eq!(report.test_size, 2);
        assert_eq!(report.train_size, 10);
        assert!(report.test_accuracy.is_some());
        assert!(report.train_accuracy > 0.9);
    }

    #[test]
    fn test_read_csv() {
        let csv = "id,description,amount,category\n\
                   1,Blue Bottle Latte,4.50,coffee\n\
                   2,Shell Fuel,40.00,Gas & Transportation\n\
                   3,,1.00,dining\n\
                   4,Mystery,2.00,spaceships\n";
        let data = ModelTrainer::read_csv(csv.as_bytes()).unwrap();
        assert_eq!(data.examples.len(), 2);
        assert_eq!(data.skipped, 2);
        assert_eq!(data.examples[0].category, Category::Dining);
        assert_eq!(data.examples[1].category, Category::Transportation);

        assert!(ModelTrainer::read_csv("id,text\n1,x\n".as_bytes()).is_err());
    }
}
