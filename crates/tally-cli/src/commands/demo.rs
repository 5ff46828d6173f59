//! Demo accuracy command

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tally_core::{
    Category, Categorizer, DemoAccuracyReport, DemoCategorizer, DemoModulator, TransactionInput,
    TransactionStore,
};

use super::{read_transactions, truncate};

pub async fn cmd_demo(
    categorizer: Arc<Categorizer>,
    file: &Path,
    target: f64,
    json: bool,
) -> Result<DemoAccuracyReport> {
    let store = read_transactions(file)?;
    let inputs: Vec<TransactionInput> = store
        .list(&Default::default())?
        .into_iter()
        .map(|t| {
            TransactionInput::new(t.description)
                .with_amount(Some(t.amount))
                .with_original_category(t.category.as_deref().and_then(Category::parse_label))
        })
        .collect();

    let demo = DemoCategorizer::new(categorizer, DemoModulator::new(target));
    let results = demo.categorize_batch(&inputs).await;
    let report = demo.report(&results);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report);
    }

    for (input, r) in inputs.iter().zip(&results) {
        println!(
            "{:<40}  {:<24} {}",
            truncate(&input.description, 40),
            r.result.category.display_name(),
            if r.was_intentional_error { "(demo error)" } else { "" }
        );
    }

    println!();
    println!(
        "🎯 Accuracy {:.1}% ({}/{}), target {:.1}%",
        report.accuracy_percentage, report.correct, report.total, report.target_accuracy
    );
    for (category, count) in &report.category_breakdown {
        println!("   {:<24} {}", category.display_name(), count);
    }

    Ok(report)
}
