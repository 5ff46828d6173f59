//! Integration tests for tally-core
//!
//! These tests exercise the full train → load → categorize → recategorize workflow.

use std::sync::Arc;
use std::time::Duration;

use tally_core::{
    config::parse_config, recategorize_month, CategorizationAnalytics, Categorizer,
    CategorizerConfig, Category, CategoryOverrides, ClassifierModel, CorrectionRecord,
    DemoCategorizer, DemoModulator, MemoryStore, MockEnrichment, ModelTrainer, RuleClassifier,
    Source, StatisticalClassifier, TrainingConfig, TransactionInput, TransactionStore,
};

/// Labelled descriptions no rule or keyword recognizes
fn training_csv() -> &'static str {
    r#"description,category,notes
QUILLFEATHER ATELIER 01,merchandise,
QUILLFEATHER ATELIER 02,merchandise,
QUILLFEATHER STUDIO,merchandise,
ZOLTARA PLATES 9,dining,
ZOLTARA PLATES 12,dining,
ZOLTARA NOSH,dining,
MERIDIAN VETCARE CLINIC,healthcare,
MERIDIAN VETCARE 44,healthcare,
MERIDIAN VETCARE HOSP,healthcare,
UNLABELLED ROW,,
MYSTERY ROW,spaceships,"#
}

fn config_without_model() -> CategorizerConfig {
    CategorizerConfig {
        model_path: None,
        ..CategorizerConfig::default()
    }
}

fn train_model() -> ClassifierModel {
    let data = ModelTrainer::read_csv(training_csv().as_bytes()).expect("Failed to read CSV");
    assert_eq!(data.examples.len(), 9);
    assert_eq!(data.skipped, 2);

    let trainer = ModelTrainer::new(TrainingConfig {
        holdout_every: 0,
        ..TrainingConfig::default()
    });
    let (model, report) = trainer.train(&data).expect("Failed to train");
    assert_eq!(report.test_size, 0);
    assert_eq!(report.train_accuracy, 1.0);
    model
}

// =============================================================================
// Training Workflow
// =============================================================================

#[tokio::test]
async fn test_train_save_load_categorize() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models").join("model.json");

    train_model().save(&path).expect("Failed to save model");

    let categorizer = Categorizer::builder()
        .config(config_without_model())
        .statistical(StatisticalClassifier::load(&path))
        .build()
        .unwrap();
    assert_eq!(categorizer.tier_names(), vec!["rules", "statistical"]);

    for (description, expected) in [
        ("QUILLFEATHER ATELIER 77", Category::Merchandise),
        ("ZOLTARA PLATES downtown", Category::Dining),
        ("MERIDIAN VETCARE", Category::Healthcare),
    ] {
        let result = categorizer.categorize(description, None, None).await;
        assert_eq!(result.category, expected, "description: {}", description);
        assert_eq!(result.source, Source::Statistical);
        assert!(result.confidence >= 0.3);
        assert!(result.alternates.len() <= 3);
        assert!(result
            .alternates
            .windows(2)
            .all(|w| w[0].1 >= w[1].1));
        assert!(result.alternates.iter().all(|(_, p)| *p > 0.10));
    }

    // Rules still come first
    let result = categorizer.categorize("STARBUCKS 1234", None, None).await;
    assert_eq!(result.source, Source::Rule);
}

#[test]
fn test_saved_artifact_is_plain_json() {
    let json = train_model().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["vectorizer"]["vocabulary"].is_object());
    assert_eq!(value["classifier"]["classes"].as_array().unwrap().len(), 3);

    let reloaded = ClassifierModel::from_json(&json).unwrap();
    assert_eq!(
        reloaded.categories(),
        vec![Category::Dining, Category::Merchandise, Category::Healthcare]
    );
}

#[tokio::test]
async fn test_corrupt_artifact_disables_statistical_tier() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    std::fs::write(&path, "{\"vectorizer\": 42}").unwrap();

    let categorizer = Categorizer::builder()
        .config(config_without_model())
        .statistical(StatisticalClassifier::load(&path))
        .build()
        .unwrap();
    assert_eq!(categorizer.tier_names(), vec!["rules"]);

    let result = categorizer
        .categorize("QUILLFEATHER ATELIER 77", None, None)
        .await;
    assert_eq!(result.source, Source::Fallback);
}

// =============================================================================
// Configuration
// =============================================================================

#[tokio::test]
async fn test_config_and_rule_overrides() {
    let config = parse_config(
        r#"
[thresholds]
rule_confidence = 0.95
fallback_confidence = 0.2

[fallback]
keywords = false
"#,
    )
    .unwrap();

    let rules = RuleClassifier::from_toml(
        r#"
protected_categories = ["rent"]
payment_rails = ['\bvenmo\b']

[[merchants]]
category = "education"
patterns = ['\bquillfeather\b']
"#,
    )
    .unwrap();

    let categorizer = Categorizer::builder()
        .config(CategorizerConfig {
            model_path: None,
            ..config
        })
        .rules(Arc::new(rules))
        .build()
        .unwrap();

    let result = categorizer.categorize("QUILLFEATHER STUDIO", None, None).await;
    assert_eq!(result.category, Category::Education);
    assert_eq!(result.confidence, 0.95);

    // Custom table has no coffee merchants, keywords are off
    let result = categorizer.categorize("STARBUCKS coffee", None, None).await;
    assert_eq!(result.category, Category::Personal);
    assert_eq!(result.confidence, 0.2);

    let result = categorizer
        .categorize("VENMO PAYMENT", None, Some("rent"))
        .await;
    assert_eq!(result.category, Category::Rent);
}

// =============================================================================
// Full Chain
// =============================================================================

#[tokio::test]
async fn test_full_chain_order() {
    let categorizer = Categorizer::builder()
        .config(CategorizerConfig {
            enrichment_timeout: Duration::from_millis(200),
            ..config_without_model()
        })
        .enrichment(Arc::new(MockEnrichment::new()))
        .statistical(StatisticalClassifier::from_model(Arc::new(train_model())))
        .build()
        .unwrap();

    let inputs = vec![
        TransactionInput::new("WHOLEFDS MKT 10234"),
        TransactionInput::new("ZIPCAR TRIP 0922"),
        TransactionInput::new("ZOLTARA PLATES 3"),
        TransactionInput::new("COMCAST CABLE").with_original_category(Some(Category::Utilities)),
        TransactionInput::new(""),
    ];
    let results = categorizer.categorize_inputs(&inputs).await;

    let sources: Vec<Source> = results.iter().map(|r| r.source).collect();
    assert_eq!(
        sources,
        vec![
            Source::Rule,
            Source::External,
            Source::Statistical,
            Source::Rule,
            Source::Statistical,
        ]
    );
    assert_eq!(results[1].category, Category::Travel);
    assert_eq!(results[3].category, Category::Utilities);
}

// =============================================================================
// Store Workflow
// =============================================================================

#[tokio::test]
async fn test_recategorize_month_workflow() {
    let csv = "\
id,date,description,amount,category
10,2024-05-01,NETFLIX.COM,-15.49,Entertainment
11,2024-05-03,ZOLTARA PLATES 9,-42.00,
12,2024-05-09,ACME PROPERTY MGMT,-1500.00,rent
13,2024-05-28,XYZ9182 UNRECOGNIZED VENDOR,-9.99,
14,2024-06-02,SHELL OIL,-30.00,
";
    let store = MemoryStore::load_csv(csv.as_bytes()).unwrap();
    let categorizer = Categorizer::builder()
        .config(config_without_model())
        .statistical(StatisticalClassifier::from_model(Arc::new(train_model())))
        .build()
        .unwrap();

    let mut overrides = CategoryOverrides::new();
    overrides.set(13, Category::Supplies);

    let outcomes = recategorize_month(&store, &categorizer, &overrides, 2024, 5, true)
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 4);

    let by_id = |id: i64| {
        store
            .list(&Default::default())
            .unwrap()
            .into_iter()
            .find(|t| t.id == id)
            .and_then(|t| t.category)
    };
    assert_eq!(by_id(10).as_deref(), Some("subscriptions"));
    assert_eq!(by_id(11).as_deref(), Some("dining"));
    assert_eq!(by_id(12).as_deref(), Some("rent"));
    assert_eq!(by_id(13).as_deref(), Some("supplies"));
    assert_eq!(by_id(14), None);
}

// =============================================================================
// Demo and Analytics
// =============================================================================

#[tokio::test]
async fn test_demo_is_deterministic() {
    let categorizer = Arc::new(
        Categorizer::builder()
            .config(config_without_model())
            .build()
            .unwrap(),
    );
    let demo = DemoCategorizer::new(categorizer, DemoModulator::default());

    let inputs: Vec<TransactionInput> = ["STARBUCKS", "SAFEWAY", "SHELL OIL", "XYZ QQQ"]
        .into_iter()
        .map(TransactionInput::new)
        .collect();

    let first = demo.accuracy_report(&inputs).await;
    let second = demo.accuracy_report(&inputs).await;
    assert_eq!(first, second);
    assert_eq!(first.total, 4);
    assert_eq!(first.target_accuracy, 70.0);
}

#[tokio::test]
async fn test_analytics_over_a_session() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("analytics.jsonl");
    let analytics = CategorizationAnalytics::open(&log).unwrap();

    let categorizer = Categorizer::builder()
        .config(config_without_model())
        .build()
        .unwrap();

    for (description, truth) in [
        ("STARBUCKS 1", Category::Dining),
        ("SAFEWAY 2", Category::Groceries),
        ("XYZ QQQ", Category::Supplies),
    ] {
        let started = std::time::Instant::now();
        let result = categorizer.categorize(description, None, None).await;
        analytics.track_request(description, &result, started.elapsed());
        analytics.track_correction(CorrectionRecord::new(description, &result, truth));
    }

    let accuracy = analytics.accuracy_report(7).unwrap();
    assert_eq!(accuracy.total_corrections, 3);
    assert!((accuracy.overall_accuracy - 200.0 / 3.0).abs() < 1e-9);

    let performance = analytics.performance_report(7).unwrap();
    assert_eq!(performance.total_requests, 3);

    let reopened = CategorizationAnalytics::open(&log).unwrap();
    assert_eq!(reopened.request_count(), 3);
    assert_eq!(reopened.correction_count(), 3);
}
