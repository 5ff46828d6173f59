//! Transaction store collaborators
//!
//! The categorizer does not own transactions. It reads them through
//! [`TransactionStore`] and writes recategorized results back through it.
//! [`MemoryStore`] is the in-process implementation, loadable from CSV.
//!
//! [`CategoryOverrides`] holds user-pinned categories. They are applied after
//! classification by the caller, never inside the tier chain.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{Datelike, NaiveDate};
use csv::ReaderBuilder;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::category::{CategorizationResult, Category};
use crate::error::{Error, Result};
use crate::orchestrator::Categorizer;

/// A stored transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
    /// Negative = expense, positive = income
    pub amount: f64,
    /// Category label as stored (bank-provided or previously assigned)
    pub category: Option<String>,
}

/// Filter for listing transactions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    /// Inclusive on both ends
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Case-insensitive substring of the description
    pub search: Option<String>,
    /// Only transactions without a category
    pub uncategorized: bool,
}

impl TransactionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter covering one calendar month
    pub fn month(year: i32, month: u32) -> Result<Self> {
        Ok(Self::new().date_range(Some(month_range(year, month)?)))
    }

    pub fn date_range(mut self, range: Option<(NaiveDate, NaiveDate)>) -> Self {
        self.date_range = range;
        self
    }

    pub fn search(mut self, query: Option<&str>) -> Self {
        self.search = query.map(str::to_lowercase);
        self
    }

    pub fn uncategorized(mut self, value: bool) -> Self {
        self.uncategorized = value;
        self
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        if let Some((from, to)) = self.date_range {
            if transaction.date < from || transaction.date > to {
                return false;
            }
        }
        if let Some(query) = &self.search {
            if !transaction.description.to_lowercase().contains(query.as_str()) {
                return false;
            }
        }
        if self.uncategorized && transaction.category.is_some() {
            return false;
        }
        true
    }
}

/// First and last day of a month
pub fn month_range(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let invalid = || Error::InvalidData(format!("Invalid month: {}-{:02}", year, month));

    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    let last = next.pred_opt().ok_or_else(invalid)?;

    Ok((first, last))
}

/// Where transactions come from and where categories go
pub trait TransactionStore: Send + Sync {
    /// Transactions matching `filter`, ordered by date then id
    fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>>;

    /// Set the category of one transaction
    fn update_category(&self, id: i64, category: Category) -> Result<()>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    transactions: RwLock<Vec<Transaction>>,
}

impl MemoryStore {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: RwLock::new(transactions),
        }
    }

    /// Load transactions from CSV
    ///
    /// Recognized columns (case-insensitive): `id`, `date`, `description`,
    /// `amount`, `category`. `date`, `description` and `amount` are required;
    /// rows without an `id` are numbered from 1 in file order.
    pub fn load_csv<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let required = |name: &str| {
            column(name).ok_or_else(|| Error::InvalidData(format!("Missing '{}' column", name)))
        };

        let date_col = required("date")?;
        let description_col = required("description")?;
        let amount_col = required("amount")?;
        let id_col = column("id");
        let category_col = column("category");

        let mut transactions = Vec::new();
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let field = |col: usize| record.get(col).unwrap_or("");

            let id = match id_col {
                Some(col) => field(col).parse::<i64>().map_err(|_| {
                    Error::InvalidData(format!("Row {}: invalid id '{}'", row + 1, field(col)))
                })?,
                None => row as i64 + 1,
            };

            transactions.push(Transaction {
                id,
                date: parse_date(field(date_col))?,
                description: field(description_col).to_string(),
                amount: parse_amount(field(amount_col))?,
                category: category_col
                    .map(|col| field(col).to_string())
                    .filter(|s| !s.is_empty()),
            });
        }

        info!("Loaded {} transactions", transactions.len());
        Ok(Self::new(transactions))
    }

    /// Snapshot of every transaction
    pub fn all(&self) -> Vec<Transaction> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Write every transaction as CSV, in the column layout `load_csv` reads
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for transaction in self.read().iter() {
            wtr.serialize(transaction)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Transaction>> {
        self.transactions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Transaction>> {
        self.transactions.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl TransactionStore for MemoryStore {
    fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let mut matched: Vec<Transaction> = self
            .read()
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        matched.sort_by_key(|t| (t.date, t.id));
        Ok(matched)
    }

    fn update_category(&self, id: i64, category: Category) -> Result<()> {
        let mut transactions = self.write();
        let transaction = transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))?;
        transaction.category = Some(category.as_str().to_string());
        Ok(())
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    let formats = [
        "%Y-%m-%d", // 2024-01-15
        "%m/%d/%Y", // 01/15/2024
        "%m/%d/%y", // 01/15/24
        "%m-%d-%Y", // 01-15-2024
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    Err(Error::InvalidData(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string, handling currency symbols and commas
fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    cleaned
        .parse::<f64>()
        .map_err(|_| Error::InvalidData(format!("Unable to parse amount: {}", s)))
}

/// User-pinned categories keyed by transaction id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryOverrides {
    pinned: HashMap<i64, Category>,
}

impl CategoryOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: i64, category: Category) {
        self.pinned.insert(id, category);
    }

    /// Remove an override, returning it
    pub fn clear(&mut self, id: i64) -> Option<Category> {
        self.pinned.remove(&id)
    }

    pub fn get(&self, id: i64) -> Option<Category> {
        self.pinned.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }

    /// Replace `result` with the pinned category, if any. Returns whether it applied.
    pub fn apply(&self, id: i64, result: &mut CategorizationResult) -> bool {
        let Some(category) = self.get(id) else {
            return false;
        };

        if category != result.category {
            result.explanation = format!(
                "User override: {} (categorizer said {})",
                category, result.category
            );
        } else {
            result.explanation = format!("User override: {}", category);
        }
        result.category = category;
        result.confidence = 1.0;
        result.alternates.clear();
        true
    }
}

/// What happened to one transaction during a month recategorization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecategorizeOutcome {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub previous: Option<String>,
    pub result: CategorizationResult,
    pub overridden: bool,
    /// The new category differs from the stored one
    pub changed: bool,
    /// The new category was written to the store
    pub applied: bool,
}

/// Categorize one month of transactions in a single batch
///
/// Overrides are applied to the batch results. When `apply` is set, changed
/// categories are written back to the store once the whole month has been
/// classified. Writes are not all-or-nothing: a failed write is logged, its
/// outcome keeps `applied == false` and the remaining rows are still written.
pub async fn recategorize_month(
    store: &dyn TransactionStore,
    categorizer: &Categorizer,
    overrides: &CategoryOverrides,
    year: i32,
    month: u32,
    apply: bool,
) -> Result<Vec<RecategorizeOutcome>> {
    let transactions = store.list(&TransactionFilter::month(year, month)?)?;
    if transactions.is_empty() {
        info!(year, month, "No transactions for month");
        return Ok(Vec::new());
    }

    let descriptions: Vec<String> = transactions.iter().map(|t| t.description.clone()).collect();
    let originals: Vec<String> = transactions
        .iter()
        .map(|t| t.category.clone().unwrap_or_default())
        .collect();

    let results = categorizer
        .categorize_month(&descriptions, Some(&originals))
        .await;

    let mut outcomes: Vec<RecategorizeOutcome> = transactions
        .into_iter()
        .zip(results)
        .map(|(transaction, mut result)| {
            let overridden = overrides.apply(transaction.id, &mut result);
            let previous_category =
                transaction.category.as_deref().and_then(Category::parse_label);
            RecategorizeOutcome {
                id: transaction.id,
                date: transaction.date,
                description: transaction.description,
                previous: transaction.category,
                changed: previous_category != Some(result.category),
                result,
                overridden,
                applied: false,
            }
        })
        .collect();

    let mut failed = 0;
    if apply {
        for outcome in outcomes.iter_mut().filter(|o| o.changed) {
            match store.update_category(outcome.id, outcome.result.category) {
                Ok(()) => {
                    outcome.applied = true;
                    debug!(
                        id = outcome.id,
                        category = %outcome.result.category,
                        "Updated category"
                    );
                }
                Err(e) => {
                    failed += 1;
                    warn!(id = outcome.id, "Failed to update category: {}", e);
                }
            }
        }
    }

    let changed = outcomes.iter().filter(|o| o.changed).count();
    info!(
        year,
        month,
        total = outcomes.len(),
        changed,
        failed,
        applied = apply,
        "Recategorized month"
    );

    Ok(outcomes)
}

/// Months present in a set of transactions, oldest first
pub fn months(transactions: &[Transaction]) -> Vec<(i32, u32)> {
    let mut months: Vec<(i32, u32)> = transactions
        .iter()
        .map(|t| (t.date.year(), t.date.month()))
        .collect();
    months.sort_unstable();
    months.dedup();
    months
}
