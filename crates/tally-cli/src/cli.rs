//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use tally_core::Category;

/// Tally - Categorize bank transactions
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Transaction categorizer for the Tally cash-flow dashboard", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Categorizer config file (defaults to the data-dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Merchant rule table (defaults to the data-dir override, then built-in rules)
    #[arg(long, global = true)]
    pub rules: Option<PathBuf>,

    /// Trained model artifact (overrides config and TALLY_MODEL_PATH)
    #[arg(long, global = true)]
    pub model: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Categorize a single description
    Categorize {
        /// Transaction description as it appears on the statement
        description: String,

        /// Transaction amount
        #[arg(long, allow_hyphen_values = true)]
        amount: Option<f64>,

        /// Category already attached to the transaction (e.g. from the bank)
        #[arg(long)]
        original: Option<String>,
    },

    /// Categorize a CSV of transactions month by month
    ///
    /// Columns: id, date, description, amount, category (id and category optional).
    Batch {
        /// Transactions CSV
        #[arg(short, long)]
        file: PathBuf,

        /// Only this month (YYYY-MM)
        #[arg(short, long, value_parser = parse_month)]
        month: Option<(i32, u32)>,

        /// Write changed categories back to the transactions
        #[arg(long)]
        apply: bool,

        /// Pin a category for a transaction id (repeatable, e.g. 12=dining)
        #[arg(long = "override", value_name = "ID=CATEGORY", value_parser = parse_override)]
        overrides: Vec<(i64, Category)>,

        /// Where to write the updated CSV with --apply (defaults to overwriting --file)
        #[arg(short, long, requires = "apply")]
        out: Option<PathBuf>,
    },

    /// Train the statistical model from labelled descriptions
    ///
    /// Columns: description, category.
    Train {
        /// Labelled CSV
        #[arg(short, long)]
        file: PathBuf,

        /// Output artifact (defaults to the model path in the data dir)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Vocabulary size cap
        #[arg(long, default_value = "2000")]
        max_features: usize,

        /// Gradient descent epochs
        #[arg(long, default_value = "500")]
        epochs: usize,
    },

    /// Run a demo batch with modulated accuracy
    Demo {
        /// Transactions CSV
        #[arg(short, long)]
        file: PathBuf,

        /// Target accuracy between 0 and 1
        #[arg(long, default_value = "0.7", value_parser = parse_unit_interval)]
        target: f64,
    },

    /// List categories
    Categories,

    /// Show the merchant rule table
    Rules,
}

/// Parse `YYYY-MM`
pub fn parse_month(s: &str) -> Result<(i32, u32), String> {
    let date = NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
        .map_err(|_| format!("Expected YYYY-MM, got '{}'", s))?;
    Ok((date.year(), date.month()))
}

/// Parse `ID=CATEGORY`
pub fn parse_override(s: &str) -> Result<(i64, Category), String> {
    let (id, category) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected ID=CATEGORY, got '{}'", s))?;
    let id: i64 = id
        .trim()
        .parse()
        .map_err(|_| format!("Invalid transaction id '{}'", id))?;
    let category = Category::parse_label(category)
        .ok_or_else(|| format!("Unknown category '{}'", category.trim()))?;
    Ok((id, category))
}

fn parse_unit_interval(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("Invalid number '{}'", s))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("Expected a value between 0 and 1, got {}", value))
    }
}
