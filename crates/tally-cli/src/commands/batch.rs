//! Month-by-month CSV categorization

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tally_core::store::months;
use tally_core::{
    recategorize_month, Categorizer, Category, CategoryOverrides, RecategorizeOutcome,
};
use tracing::warn;

use super::{read_transactions, truncate};

/// Categorize every month in `file` (or just `month`)
///
/// With `apply`, changed categories are written to `out`, or back to `file`.
pub async fn cmd_batch(
    categorizer: &Categorizer,
    file: &Path,
    month: Option<(i32, u32)>,
    apply: bool,
    overrides: &[(i64, Category)],
    out: Option<&Path>,
    json: bool,
) -> Result<Vec<RecategorizeOutcome>> {
    let store = read_transactions(file)?;
    let all = store.all();

    let mut pinned = CategoryOverrides::new();
    for (id, category) in overrides {
        if !all.iter().any(|t| t.id == *id) {
            warn!(id, "Override for unknown transaction id");
        }
        pinned.set(*id, *category);
    }

    let periods = match month {
        Some(m) => vec![m],
        None => months(&all),
    };

    let mut outcomes = Vec::new();
    for (year, month) in periods {
        let batch = recategorize_month(&store, categorizer, &pinned, year, month, apply)
            .await
            .with_context(|| format!("Failed to categorize {}-{:02}", year, month))?;
        outcomes.extend(batch);
    }

    if apply {
        let target = out.unwrap_or(file);
        let writer = File::create(target)
            .with_context(|| format!("Failed to create {}", target.display()))?;
        store
            .write_csv(writer)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        if !json {
            println!("✅ Wrote {} transactions to {}", store.len(), target.display());
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        print_outcomes(&outcomes, apply);
    }

    Ok(outcomes)
}

fn print_outcomes(outcomes: &[RecategorizeOutcome], applied: bool) {
    if outcomes.is_empty() {
        println!("No transactions found.");
        return;
    }

    println!(
        "{:>6}  {:<10}  {:<36}  {:<14}  {:<14}  {:<11}  {:>5}",
        "ID", "Date", "Description", "Was", "Now", "Source", "Conf"
    );
    println!("{}", "-".repeat(108));
    for o in outcomes {
        let marker = if applied && o.changed && !o.applied {
            "x"
        } else if o.overridden {
            "!"
        } else if o.changed {
            "*"
        } else {
            ""
        };
        println!(
            "{:>6}  {:<10}  {:<36}  {:<14}  {:<14}  {:<11}  {:>4.0}% {}",
            o.id,
            o.date,
            truncate(&o.description, 36),
            truncate(o.previous.as_deref().unwrap_or("-"), 14),
            o.result.category.as_str(),
            o.result.source.as_str(),
            o.result.confidence * 100.0,
            marker
        );
    }

    let changed = outcomes.iter().filter(|o| o.changed).count();
    let overridden = outcomes.iter().filter(|o| o.overridden).count();
    let failed = outcomes.iter().filter(|o| o.changed && !o.applied).count();
    println!();
    if applied && failed > 0 {
        println!("{} changes could not be saved (x)", failed);
    }
    println!(
        "{} transactions, {} changed (*), {} overridden (!){}",
        outcomes.len(),
        changed,
        overridden,
        if applied { "" } else { " - dry run, pass --apply to save" }
    );
}
