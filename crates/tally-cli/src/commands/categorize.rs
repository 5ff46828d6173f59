//! Single-description categorization

use anyhow::Result;
use tally_core::{CategorizationResult, Categorizer};

pub async fn cmd_categorize(
    categorizer: &Categorizer,
    description: &str,
    amount: Option<f64>,
    original: Option<&str>,
    json: bool,
) -> Result<CategorizationResult> {
    let result = categorizer.categorize(description, amount, original).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(result);
    }

    println!("Category:    {}", result.category.display_name());
    println!("Confidence:  {:.0}%", result.confidence * 100.0);
    println!("Source:      {}", result.source);
    println!("Explanation: {}", result.explanation);
    if let Some(merchant) = &result.merchant_name {
        println!("Merchant:    {}", merchant);
    }
    if !result.alternates.is_empty() {
        println!("Alternates:");
        for (category, probability) in &result.alternates {
            println!("  {:<24} {:>5.1}%", category.display_name(), probability * 100.0);
        }
    }

    Ok(result)
}
