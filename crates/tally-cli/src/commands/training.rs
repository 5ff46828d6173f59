//! Model training command

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tally_core::config::default_model_path;
use tally_core::{ModelTrainer, TrainingConfig, TrainingReport};

pub fn cmd_train(
    file: &Path,
    out: Option<&Path>,
    max_features: usize,
    epochs: usize,
    json: bool,
) -> Result<TrainingReport> {
    let out = match out {
        Some(path) => path.to_path_buf(),
        None => default_model_path()
            .context("No data directory available; pass --out for the model artifact")?,
    };

    let reader =
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let data = ModelTrainer::read_csv(reader)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    if !json {
        println!(
            "📊 Training on {} labelled rows ({} skipped)",
            data.examples.len(),
            data.skipped
        );
    }

    let trainer = ModelTrainer::new(TrainingConfig {
        max_features,
        epochs,
        ..TrainingConfig::default()
    });
    let (model, report) = trainer.train(&data).context("Training failed")?;

    model
        .save(&out)
        .with_context(|| format!("Failed to save model to {}", out.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report);
    }

    println!("   Classes:   {}", report.classes.len());
    println!("   Features:  {}", report.num_features);
    println!(
        "   Split:     {} train / {} test",
        report.train_size, report.test_size
    );
    println!("   Train accuracy: {:.1}%", report.train_accuracy * 100.0);
    match report.test_accuracy {
        Some(acc) => println!("   Test accuracy:  {:.1}%", acc * 100.0),
        None => println!("   Test accuracy:  n/a (too few rows to hold out)"),
    }
    println!("✅ Saved model to {}", out.display());

    Ok(report)
}
