//! Keyword matcher: the lowest classification tier
//!
//! Plain substring matching against a fixed keyword table. Categories are
//! checked in table order and the first hit wins, so the order below decides
//! ties (e.g. "gas" is a utility before it is anything else). Always returns a
//! category; unmatched text gets the catch-all.

use crate::category::Category;

/// Keyword table in tie-breaking order
const KEYWORD_TABLE: &[(Category, &[&str])] = &[
    (Category::Rent, &["rent", "lease", "housing"]),
    (
        Category::Utilities,
        &["electric", "water", "gas", "utility", "utilities"],
    ),
    (
        Category::Groceries,
        &["grocery", "supermarket", "food", "market"],
    ),
    (
        Category::Transportation,
        &["uber", "lyft", "taxi", "transit", "transport"],
    ),
    (
        Category::Entertainment,
        &["movie", "theater", "concert", "ticket"],
    ),
    (
        Category::Healthcare,
        &["doctor", "medical", "pharmacy", "health"],
    ),
    (
        Category::Subscriptions,
        &["netflix", "spotify", "subscription", "membership"],
    ),
    (Category::Fees, &["fee", "charge", "service charge"]),
    (Category::Taxes, &["tax", "irs", "withholding"]),
    (Category::Insurance, &["insurance", "coverage", "policy"]),
    (Category::Supplies, &["supply", "equipment", "material"]),
    (Category::Merchandise, &["merchandise", "product", "item"]),
    (
        Category::Dining,
        &[
            "restaurant",
            "cafe",
            "dining",
            "meal",
            "coffee",
            "espresso",
            "pastry",
            "bakery",
            "bread",
            "cake",
            "sandwich",
            "sub",
            "wrap",
            "catering",
            "event",
            "party",
        ],
    ),
    (
        Category::Marketing,
        &["advertising", "marketing", "promotion"],
    ),
    (Category::Maintenance, &["maintenance", "repair", "service"]),
    (Category::Personal, &["misc", "miscellaneous", "other"]),
];

/// Substring keyword matcher
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordMatcher;

impl KeywordMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Map a description to the first category with a keyword hit
    pub fn match_description(&self, description: &str) -> Category {
        let lower = description.to_lowercase();

        KEYWORD_TABLE
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(category, _)| *category)
            .unwrap_or(Category::CATCH_ALL)
    }

    /// Keywords of `category` that occur in `description`
    pub fn matched_keywords(&self, description: &str, category: Category) -> Vec<&'static str> {
        let lower = description.to_lowercase();

        KEYWORD_TABLE
            .iter()
            .filter(|(c, _)| *c == category)
            .flat_map(|(_, keywords)| keywords.iter().copied())
            .filter(|k| lower.contains(k))
            .collect()
    }

    /// Match and describe why
    pub fn explain(&self, description: &str) -> (Category, String) {
        let category = self.match_description(description);
        let keywords = self.matched_keywords(description, category);

        let explanation = if keywords.is_empty() {
            "No keyword matches".to_string()
        } else {
            format!("Matched keywords: {}", keywords.join(", "))
        };

        (category, explanation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_matches() {
        let matcher = KeywordMatcher::new();
        assert_eq!(matcher.match_description("Monthly RENT payment"), Category::Rent);
        assert_eq!(matcher.match_description("UBER TRIP 1234"), Category::Transportation);
        assert_eq!(matcher.match_description("Corner Bakery"), Category::Dining);
        assert_eq!(matcher.match_description("IRS estimated tax"), Category::Taxes);
    }

    #[test]
    fn test_first_match_wins() {
        let matcher = KeywordMatcher::new();
        // "gas" (utilities) is checked before "food" (groceries)
        assert_eq!(
            matcher.match_description("gas and food mart"),
            Category::Utilities
        );
        // "market" (groceries) wins over "marketing" (marketing): groceries comes first
        assert_eq!(
            matcher.match_description("marketing agency"),
            Category::Groceries
        );
        // "coffee" contains "fee", and fees are checked before dining
        assert_eq!(matcher.match_description("coffee"), Category::Fees);
    }

    #[test]
    fn test_no_match_is_catch_all() {
        let matcher = KeywordMatcher::new();
        assert_eq!(
            matcher.match_description("XYZ9182 UNRECOGNIZED VENDOR"),
            Category::Personal
        );
        assert_eq!(matcher.match_description(""), Category::Personal);
        assert_eq!(matcher.match_description("12345 !!!"), Category::Personal);
    }

    #[test]
    fn test_idempotent() {
        let matcher = KeywordMatcher::new();
        for input in ["Netflix.com", "", "coffee", "ZZZ", "electric co"] {
            assert_eq!(
                matcher.match_description(input),
                matcher.match_description(input)
            );
        }
    }

    #[test]
    fn test_explain() {
        let matcher = KeywordMatcher::new();
        let (category, explanation) = matcher.explain("Corner Cafe Espresso");
        assert_eq!(category, Category::Dining);
        assert_eq!(explanation, "Matched keywords: cafe, espresso");

        let (category, explanation) = matcher.explain("QQQ");
        assert_eq!(category, Category::Personal);
        assert_eq!(explanation, "No keyword matches");
    }
}
