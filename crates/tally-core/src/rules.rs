//! Pattern-rule classifier
//!
//! Encodes domain knowledge that keywords can't: protected bill categories,
//! known merchant names grouped by category, and payment-rail markers.
//! Runs before any model. Precedence:
//!
//! 1. Original category in the protected set → keep it
//! 2. First category whose merchant patterns match → that category
//! 3. Payment-rail marker → keep a non-catch-all original, else catch-all
//! 4. Otherwise no answer (defer to the next tier)
//!
//! The table is loaded from `config/rules.toml` (embedded) or an override
//! file in the data directory, like the categorizer config.

use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::category::Category;
use crate::config::resolve_config_text;
use crate::error::{Error, Result};

/// Embedded default rule table (compiled into binary)
const DEFAULT_RULES: &str = include_str!("../../../config/rules.toml");

/// Why a rule fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleReason {
    /// Original category is a trusted bill category
    ProtectedBill,
    /// A merchant pattern matched
    MerchantPattern,
    /// Description is a payment-rail transfer (Zelle, Venmo, check, ...)
    PaymentRail,
}

/// A rule-tier decision
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub category: Category,
    pub reason: RuleReason,
    /// Matched text (merchant or payment marker), if any
    pub matched: Option<String>,
}

impl RuleMatch {
    /// Human-readable explanation
    pub fn explanation(&self) -> String {
        match self.reason {
            RuleReason::ProtectedBill => format!(
                "Bill transaction - keeping original category: {}",
                self.category
            ),
            RuleReason::MerchantPattern => match &self.matched {
                Some(m) => format!("Merchant pattern '{}' matched: {}", m, self.category),
                None => format!("Merchant pattern matched: {}", self.category),
            },
            RuleReason::PaymentRail if self.category.is_catch_all() => {
                "Payment method transaction".to_string()
            }
            RuleReason::PaymentRail => format!(
                "Payment method - keeping original category: {}",
                self.category
            ),
        }
    }
}

/// One category's compiled merchant patterns
#[derive(Debug, Clone)]
pub struct MerchantRule {
    pub category: Category,
    /// Source patterns, for display
    pub patterns: Vec<String>,
    regex: Regex,
}

/// Ordered pattern-rule classifier
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    protected: Vec<Category>,
    merchants: Vec<MerchantRule>,
    payment_rails: Option<Regex>,
    payment_patterns: Vec<String>,
}

impl RuleClassifier {
    /// Load the rule table (override first, then embedded default)
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let content = resolve_config_text(override_path, "rules.toml", DEFAULT_RULES)?;
        let classifier = Self::from_toml(&content)?;
        info!(
            merchant_rules = classifier.merchants.len(),
            "Loaded merchant rule table"
        );
        Ok(classifier)
    }

    /// Build from the embedded default table
    pub fn embedded() -> Result<Self> {
        Self::from_toml(DEFAULT_RULES)
    }

    /// Parse and compile a rule table
    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawRules = toml::from_str(content)?;

        let protected = raw
            .protected_categories
            .iter()
            .map(|label| label.parse::<Category>())
            .collect::<Result<Vec<_>>>()?;

        let mut merchants = Vec::with_capacity(raw.merchants.len());
        for rule in raw.merchants {
            let category: Category = rule.category.parse()?;
            let Some(regex) = compile_alternation(&rule.patterns)? else {
                debug!(category = %category, "Skipping merchant rule with no patterns");
                continue;
            };
            merchants.push(MerchantRule {
                category,
                patterns: rule.patterns,
                regex,
            });
        }

        let payment_rails = compile_alternation(&raw.payment_rails)?;

        Ok(Self {
            protected,
            merchants,
            payment_rails,
            payment_patterns: raw.payment_rails,
        })
    }

    /// Classify a description, or return `None` to defer to later tiers
    pub fn classify(
        &self,
        description: &str,
        original_category: Option<Category>,
    ) -> Option<RuleMatch> {
        // 1. Bills are assumed pre-classified correctly
        if let Some(original) = original_category {
            if self.protected.contains(&original) {
                return Some(RuleMatch {
                    category: original,
                    reason: RuleReason::ProtectedBill,
                    matched: None,
                });
            }
        }

        // 2. Known merchants, in table order
        if let Some((category, matched)) = self.match_merchant(description) {
            return Some(RuleMatch {
                category,
                reason: RuleReason::MerchantPattern,
                matched: Some(matched),
            });
        }

        // 3. Payment rails say how money moved, not what it bought
        if let Some(rails) = &self.payment_rails {
            if let Some(m) = rails.find(description) {
                let category = match original_category {
                    Some(original) if !original.is_catch_all() => original,
                    _ => Category::CATCH_ALL,
                };
                return Some(RuleMatch {
                    category,
                    reason: RuleReason::PaymentRail,
                    matched: Some(m.as_str().to_string()),
                });
            }
        }

        None
    }

    /// First merchant rule that matches, with the matched text
    pub fn match_merchant(&self, description: &str) -> Option<(Category, String)> {
        self.merchants.iter().find_map(|rule| {
            rule.regex
                .find(description)
                .map(|m| (rule.category, m.as_str().to_string()))
        })
    }

    pub fn is_payment_rail(&self, description: &str) -> bool {
        self.payment_rails
            .as_ref()
            .is_some_and(|r| r.is_match(description))
    }

    pub fn protected_categories(&self) -> &[Category] {
        &self.protected
    }

    pub fn merchant_rules(&self) -> &[MerchantRule] {
        &self.merchants
    }

    pub fn payment_patterns(&self) -> &[String] {
        &self.payment_patterns
    }
}

/// Combine patterns into one case-insensitive alternation.
///
/// Returns `None` for an empty list; rejects empty patterns, which would
/// match every description.
fn compile_alternation(patterns: &[String]) -> Result<Option<Regex>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    if let Some(empty) = patterns.iter().position(|p| p.trim().is_empty()) {
        return Err(Error::Config(format!(
            "Empty rule pattern at position {}",
            empty
        )));
    }

    let joined = patterns
        .iter()
        .map(|p| format!("(?:{})", p))
        .collect::<Vec<_>>()
        .join("|");

    Ok(Some(Regex::new(&format!("(?i){}", joined))?))
}

/// Raw rule table for TOML parsing
#[derive(Debug, Deserialize)]
struct RawRules {
    #[serde(default)]
    protected_categories: Vec<String>,
    #[serde(default)]
    payment_rails: Vec<String>,
    #[serde(default)]
    merchants: Vec<RawMerchantRule>,
}

#[derive(Debug, Deserialize)]
struct RawMerchantRule {
    category: String,
    #[serde(default)]
    patterns: Vec<String>,
}
