//! Category taxonomy and categorization result types
//!
//! `Category` is the one closed enumeration shared by every tier. External and
//! legacy spellings ("coffee", "gas_automotive", "Bills & Utilities", ...) are
//! translated exactly once, by [`Category::parse_label`], at the boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Spending/income category assigned to a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Restaurants, coffee shops, bakeries, catering, food delivery
    Dining,
    Groceries,
    /// General retail and online marketplaces
    Merchandise,
    /// Business and hardware supplies
    Supplies,
    /// Fuel, rideshare, parking, tolls, auto services
    Transportation,
    /// Airlines, hotels, rentals
    Travel,
    /// Power, water, phone, cable, internet
    Utilities,
    /// Rent, mortgage, lease
    Rent,
    Insurance,
    Subscriptions,
    Entertainment,
    Healthcare,
    Education,
    /// Bank fees and service charges
    Fees,
    Taxes,
    /// Home maintenance and repairs
    Maintenance,
    Marketing,
    /// Salary, refunds, payments received
    Income,
    /// Catch-all for anything no tier could place
    Personal,
}

impl Category {
    /// The designated catch-all member
    pub const CATCH_ALL: Category = Category::Personal;

    /// Get all categories in canonical order
    pub fn all() -> &'static [Category] {
        &[
            Self::Dining,
            Self::Groceries,
            Self::Merchandise,
            Self::Supplies,
            Self::Transportation,
            Self::Travel,
            Self::Utilities,
            Self::Rent,
            Self::Insurance,
            Self::Subscriptions,
            Self::Entertainment,
            Self::Healthcare,
            Self::Education,
            Self::Fees,
            Self::Taxes,
            Self::Maintenance,
            Self::Marketing,
            Self::Income,
            Self::Personal,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dining => "dining",
            Self::Groceries => "groceries",
            Self::Merchandise => "merchandise",
            Self::Supplies => "supplies",
            Self::Transportation => "transportation",
            Self::Travel => "travel",
            Self::Utilities => "utilities",
            Self::Rent => "rent",
            Self::Insurance => "insurance",
            Self::Subscriptions => "subscriptions",
            Self::Entertainment => "entertainment",
            Self::Healthcare => "healthcare",
            Self::Education => "education",
            Self::Fees => "fees",
            Self::Taxes => "taxes",
            Self::Maintenance => "maintenance",
            Self::Marketing => "marketing",
            Self::Income => "income",
            Self::Personal => "personal",
        }
    }

    /// Human-readable name for dashboards and reports
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Dining => "Dining & Restaurants",
            Self::Groceries => "Groceries",
            Self::Merchandise => "Shopping & Merchandise",
            Self::Supplies => "Supplies",
            Self::Transportation => "Gas & Transportation",
            Self::Travel => "Travel",
            Self::Utilities => "Bills & Utilities",
            Self::Rent => "Home & Rent/Mortgage",
            Self::Insurance => "Insurance",
            Self::Subscriptions => "Subscriptions",
            Self::Entertainment => "Entertainment",
            Self::Healthcare => "Healthcare",
            Self::Education => "Education",
            Self::Fees => "Fees & Charges",
            Self::Taxes => "Taxes",
            Self::Maintenance => "Home Maintenance",
            Self::Marketing => "Marketing",
            Self::Income => "Income",
            Self::Personal => "Personal",
        }
    }

    pub fn is_catch_all(&self) -> bool {
        *self == Self::CATCH_ALL
    }

    /// Parse any known spelling of a category.
    ///
    /// Accepts canonical labels, display names and the legacy labels used by
    /// older data sources. Matching ignores case and punctuation, so
    /// "Bills & Utilities", "bills-utilities" and "BILLS_UTILITIES" are all the same.
    /// Returns `None` for labels outside the taxonomy.
    pub fn parse_label(label: &str) -> Option<Category> {
        let key = normalize_label(label);

        let category = match key.as_str() {
            "dining" | "food" | "coffee" | "pastry" | "sandwich" | "catering" | "restaurant"
            | "restaurants" | "dining_restaurants" => Self::Dining,
            "groceries" | "grocery" => Self::Groceries,
            "merchandise" | "shopping" | "merchandise_shopping" | "shopping_merchandise" => {
                Self::Merchandise
            }
            "supplies" | "supply" => Self::Supplies,
            "transportation" | "transport" | "gas_automotive" | "gas_transportation" | "auto"
            | "gas" => Self::Transportation,
            "travel" | "travel_airlines" | "travel_hotels" | "travel_car_rentals" => Self::Travel,
            "utilities" | "bill" | "bills" | "bills_utilities" | "phone_cable_utilities" => {
                Self::Utilities
            }
            "rent" | "mortgage" | "housing" | "home_rent_mortgage" => Self::Rent,
            "insurance" => Self::Insurance,
            "subscriptions" | "subscription" => Self::Subscriptions,
            "entertainment" => Self::Entertainment,
            "healthcare" | "health" | "medical" => Self::Healthcare,
            "education" => Self::Education,
            "fees" | "fee" | "fees_charges" => Self::Fees,
            "taxes" | "tax" => Self::Taxes,
            "maintenance" | "home" | "home_maintenance" => Self::Maintenance,
            "marketing" => Self::Marketing,
            "income" | "salary" => Self::Income,
            "personal" | "misc" | "miscellaneous" | "other" | "unknown" => Self::Personal,
            _ => return None,
        };

        Some(category)
    }
}

/// Lowercase, turn every run of non-alphanumerics into a single `_`, trim `_`
fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_sep = false;

    for c in label.trim().chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }

    out
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Category::parse_label(s).ok_or_else(|| Error::UnknownCategory(s.to_string()))
    }
}

/// Which tier produced a categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Pattern-rule classifier (merchant patterns, protected bills, payment rails)
    Rule,
    /// Trained TF-IDF + logistic regression model
    Statistical,
    /// External enrichment API
    External,
    /// Keyword matcher / catch-all default
    Fallback,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Statistical => "statistical",
            Self::External => "external",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rule" => Ok(Self::Rule),
            "statistical" => Ok(Self::Statistical),
            "external" => Ok(Self::External),
            "fallback" => Ok(Self::Fallback),
            _ => Err(format!("Unknown categorization source: {}", s)),
        }
    }
}

/// One transaction as seen by the classifiers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionInput {
    pub description: String,
    pub amount: Option<f64>,
    /// Category already attached to the transaction (bank- or user-provided)
    pub original_category: Option<Category>,
}

impl TransactionInput {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            amount: None,
            original_category: None,
        }
    }

    pub fn with_amount(mut self, amount: Option<f64>) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_original_category(mut self, category: Option<Category>) -> Self {
        self.original_category = category;
        self
    }
}

/// Maximum number of alternates carried on a result
pub const MAX_ALTERNATES: usize = 3;

/// Final answer for one transaction description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizationResult {
    pub category: Category,
    /// Confidence in [0, 1]; meaning depends on `source`
    pub confidence: f64,
    pub source: Source,
    pub explanation: String,
    /// Other likely categories with their probabilities, highest first
    #[serde(default)]
    pub alternates: Vec<(Category, f64)>,
    /// Clean merchant name, when the external API supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
}

impl CategorizationResult {
    pub fn new(
        category: Category,
        confidence: f64,
        source: Source,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            category,
            confidence: clamp_confidence(confidence),
            source,
            explanation: explanation.into(),
            alternates: Vec::new(),
            merchant_name: None,
        }
    }

    /// Attach alternates, keeping at most [`MAX_ALTERNATES`] in descending order
    pub fn with_alternates(mut self, mut alternates: Vec<(Category, f64)>) -> Self {
        alternates.sort_by(|a, b| b.1.total_cmp(&a.1));
        alternates.truncate(MAX_ALTERNATES);
        self.alternates = alternates
            .into_iter()
            .map(|(c, p)| (c, clamp_confidence(p)))
            .collect();
        self
    }

    pub fn with_merchant_name(mut self, merchant_name: Option<String>) -> Self {
        self.merchant_name = merchant_name;
        self
    }
}

/// Clamp into [0, 1], mapping NaN to 0
pub(crate) fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_labels_round_trip() {
        for category in Category::all() {
            assert_eq!(Category::parse_label(category.as_str()), Some(*category));
        }
    }

    #[test]
    fn test_display_names_parse() {
        for category in Category::all() {
            assert_eq!(
                Category::parse_label(category.display_name()),
                Some(*category),
                "display name {:?} did not parse",
                category.display_name()
            );
        }
    }

    #[test]
    fn test_legacy_spellings() {
        assert_eq!(Category::parse_label("coffee"), Some(Category::Dining));
        assert_eq!(Category::parse_label("PASTRY"), Some(Category::Dining));
        assert_eq!(
            Category::parse_label("Phone, Cable & Utilities"),
            Some(Category::Utilities)
        );
        assert_eq!(
            Category::parse_label("gas_automotive"),
            Some(Category::Transportation)
        );
        assert_eq!(Category::parse_label("Travel - Hotels"), Some(Category::Travel));
        assert_eq!(Category::parse_label("misc"), Some(Category::Personal));
        assert_eq!(Category::parse_label(" Other "), Some(Category::Personal));
        assert_eq!(Category::parse_label("salary"), Some(Category::Income));
    }

    #[test]
    fn test_unknown_labels() {
        assert_eq!(Category::parse_label(""), None);
        assert_eq!(Category::parse_label("spaceships"), None);
        assert!("spaceships".parse::<Category>().is_err());
    }

    #[test]
    fn test_catch_all() {
        assert!(Category::Personal.is_catch_all());
        assert!(!Category::Dining.is_catch_all());
        assert_eq!(Category::CATCH_ALL, Category::Personal);
    }

    #[test]
    fn test_source_parse() {
        assert_eq!("rule".parse::<Source>().unwrap(), Source::Rule);
        assert_eq!("Fallback".parse::<Source>().unwrap(), Source::Fallback);
        assert!("ollama".parse::<Source>().is_err());
    }

    #[test]
    fn test_result_clamps_and_caps() {
        let result = CategorizationResult::new(Category::Dining, 1.7, Source::Rule, "x")
            .with_alternates(vec![
                (Category::Groceries, 0.2),
                (Category::Dining, 0.5),
                (Category::Travel, 0.15),
                (Category::Personal, 0.12),
            ]);

        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.alternates.len(), MAX_ALTERNATES);
        assert_eq!(result.alternates[0].0, Category::Dining);
        assert_eq!(result.alternates[2].0, Category::Travel);
    }

    #[test]
    fn test_nan_confidence() {
        let result = CategorizationResult::new(Category::Dining, f64::NAN, Source::External, "");
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_serde_labels() {
        let json = serde_json::to_string(&Category::Dining).unwrap();
        assert_eq!(json, "\"dining\"");
        let source: Source = serde_json::from_str("\"statistical\"").unwrap();
        assert_eq!(source, Source::Statistical);
    }
}
