//! Category and rule listings

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{Category, RuleClassifier};

pub fn cmd_categories(json: bool) -> Result<()> {
    if json {
        let categories: Vec<serde_json::Value> = Category::all()
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.as_str(),
                    "name": c.display_name(),
                    "catch_all": c.is_catch_all(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&categories)?);
        return Ok(());
    }

    for category in Category::all() {
        let marker = if category.is_catch_all() { " (catch-all)" } else { "" };
        println!("{:<16} {}{}", category.as_str(), category.display_name(), marker);
    }
    Ok(())
}

pub fn cmd_rules(rules_path: Option<&Path>, json: bool) -> Result<RuleClassifier> {
    let rules = RuleClassifier::load(rules_path).context("Failed to load rule table")?;

    if json {
        let merchants: Vec<serde_json::Value> = rules
            .merchant_rules()
            .iter()
            .map(|r| serde_json::json!({ "category": r.category, "patterns": r.patterns }))
            .collect();
        let value = serde_json::json!({
            "protected_categories": rules.protected_categories(),
            "payment_rails": rules.payment_patterns(),
            "merchants": merchants,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(rules);
    }

    let protected: Vec<&str> = rules.protected_categories().iter().map(|c| c.as_str()).collect();
    println!("Protected bills: {}", protected.join(", "));
    println!("Payment rails:   {}", rules.payment_patterns().join(", "));
    println!();
    println!("Merchant rules (first match wins):");
    for rule in rules.merchant_rules() {
        println!(
            "  {:<16} {} patterns",
            rule.category.as_str(),
            rule.patterns.len()
        );
    }
    Ok(rules)
}
