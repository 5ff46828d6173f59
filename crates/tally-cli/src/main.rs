//! Tally CLI - Transaction categorizer
//!
//! Usage:
//!   tally categorize "STARBUCKS 1234"     Categorize one description
//!   tally batch --file tx.csv --apply     Recategorize a CSV month by month
//!   tally train --file labelled.csv       Train the statistical model
//!   tally demo --file tx.csv --target 0.7 Demo run with modulated accuracy

mod cli;
mod commands;


use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .init();

    let load = || {
        commands::load_categorizer(
            cli.config.as_deref(),
            cli.rules.as_deref(),
            cli.model.as_deref(),
        )
    };

    match &cli.command {
        Commands::Categorize {
            description,
            amount,
            original,
        } => {
            let categorizer = load()?;
            commands::cmd_categorize(
                &categorizer,
                description,
                *amount,
                original.as_deref(),
                cli.json,
            )
            .await?;
        }
        Commands::Batch {
            file,
            month,
            apply,
            overrides,
            out,
        } => {
            let categorizer = load()?;
            commands::cmd_batch(
                &categorizer,
                file,
                *month,
                *apply,
                overrides,
                out.as_deref(),
                cli.json,
            )
            .await?;
        }
        Commands::Train {
            file,
            out,
            max_features,
            epochs,
        } => {
            // --model doubles as the output path
            let out = out.as_deref().or(cli.model.as_deref());
            commands::cmd_train(file, out, *max_features, *epochs, cli.json)?;
        }
        Commands::Demo { file, target } => {
            let categorizer = Arc::new(load()?);
            commands::cmd_demo(categorizer, file, *target, cli.json).await?;
        }
        Commands::Categories => commands::cmd_categories(cli.json)?,
        Commands::Rules => {
            commands::cmd_rules(cli.rules.as_deref(), cli.json)?;
        }
    }

    Ok(())
}
