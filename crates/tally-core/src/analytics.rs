//! Categorization request and correction analytics
//!
//! Records what the categorizer answered and what users later corrected, and
//! summarizes both over a trailing window. Records live in memory and can
//! optionally be appended to a JSON-lines file so they survive restarts.
//!
//! Analytics only observe. Nothing here feeds back into a classifier.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::category::{CategorizationResult, Category, Source};
use crate::error::Result;

/// Predictions need this many samples before their error rate is judged
pub const MIN_SAMPLES_FOR_ERROR_RATE: usize = 5;
/// Error rate above which a prediction is flagged
pub const HIGH_ERROR_RATE: f64 = 0.3;
/// Wrong answers below this confidence count as low-confidence errors
pub const LOW_CONFIDENCE: f64 = 0.7;
/// Share of corrections that low-confidence errors may reach before being flagged
pub const LOW_CONFIDENCE_ERROR_SHARE: f64 = 0.2;

/// One categorization served
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetric {
    pub timestamp: DateTime<Utc>,
    pub description_length: usize,
    pub source: Source,
    pub category: Category,
    pub confidence: f64,
    pub latency_ms: u64,
}

/// A user's verdict on a categorization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRecord {
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub ai_prediction: Category,
    pub user_correction: Category,
    pub confidence: f64,
    pub source: Source,
}

impl CorrectionRecord {
    pub fn new(
        description: impl Into<String>,
        result: &CategorizationResult,
        user_correction: Category,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            description: description.into(),
            ai_prediction: result.category,
            user_correction,
            confidence: result.confidence,
            source: result.source,
        }
    }

    pub fn was_correct(&self) -> bool {
        self.ai_prediction == self.user_correction
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceAccuracy {
    pub total: usize,
    pub correct: usize,
    /// Percent
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyReport {
    pub period_days: u32,
    pub total_corrections: usize,
    /// Percent
    pub overall_accuracy: f64,
    pub accuracy_by_source: BTreeMap<Source, SourceAccuracy>,
    pub improvement_opportunities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourcePerformance {
    pub total: usize,
    pub avg_latency_ms: f64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub period_days: u32,
    pub total_requests: usize,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub max_latency_ms: u64,
    pub by_source: BTreeMap<Source, SourcePerformance>,
}

/// Line format of the persistence file
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum LogRecord {
    Request(RequestMetric),
    Correction(CorrectionRecord),
}

#[derive(Default)]
struct Records {
    requests: Vec<RequestMetric>,
    corrections: Vec<CorrectionRecord>,
}

/// In-memory analytics with optional JSON-lines persistence
#[derive(Default)]
pub struct CategorizationAnalytics {
    records: Mutex<Records>,
    log_path: Option<PathBuf>,
}

impl CategorizationAnalytics {
    /// Analytics kept in memory only
    pub fn new() -> Self {
        Self::default()
    }

    /// Analytics backed by a JSON-lines file
    ///
    /// Existing records in the file are loaded; unreadable lines are skipped.
    /// New records are appended as they are tracked.
    pub fn open(path: &Path) -> Result<Self> {
        let mut records = Records::default();

        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let mut skipped = 0;
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<LogRecord>(&line) {
                    Ok(LogRecord::Request(m)) => records.requests.push(m),
                    Ok(LogRecord::Correction(c)) => records.corrections.push(c),
                    Err(_) => skipped += 1,
                }
            }
            if skipped > 0 {
                warn!(path = %path.display(), skipped, "Skipped unreadable analytics records");
            }
            info!(
                path = %path.display(),
                requests = records.requests.len(),
                corrections = records.corrections.len(),
                "Loaded analytics log"
            );
        } else if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self {
            records: Mutex::new(records),
            log_path: Some(path.to_path_buf()),
        })
    }

    /// Record a categorization that was served
    pub fn track_request(
        &self,
        description: &str,
        result: &CategorizationResult,
        latency: Duration,
    ) -> RequestMetric {
        let metric = RequestMetric {
            timestamp: Utc::now(),
            description_length: description.chars().count(),
            source: result.source,
            category: result.category,
            confidence: result.confidence,
            latency_ms: u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
        };

        if metric.source == Source::Fallback {
            warn!(
                description = %truncate(description, 50),
                "Fallback categorization used"
            );
        }

        let mut records = self.lock();
        self.append(&LogRecord::Request(metric.clone()));
        records.requests.push(metric.clone());
        metric
    }

    /// Record a user correction (or confirmation)
    pub fn track_correction(&self, record: CorrectionRecord) {
        info!(
            from = %record.ai_prediction,
            to = %record.user_correction,
            confidence = record.confidence,
            "User correction"
        );
        let mut records = self.lock();
        self.append(&LogRecord::Correction(record.clone()));
        records.corrections.push(record);
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn correction_count(&self) -> usize {
        self.lock().corrections.len()
    }

    /// Accuracy over corrections from the last `days` days
    ///
    /// Returns `None` when there are no corrections in the window.
    pub fn accuracy_report(&self, days: u32) -> Option<AccuracyReport> {
        let cutoff = cutoff(days);
        let records = self.lock();
        let recent: Vec<&CorrectionRecord> = records
            .corrections
            .iter()
            .filter(|c| c.timestamp > cutoff)
            .collect();

        if recent.is_empty() {
            return None;
        }

        let total = recent.len();
        let correct = recent.iter().filter(|c| c.was_correct()).count();

        let mut accuracy_by_source: BTreeMap<Source, SourceAccuracy> = BTreeMap::new();
        for c in &recent {
            let entry = accuracy_by_source.entry(c.source).or_default();
            entry.total += 1;
            if c.was_correct() {
                entry.correct += 1;
            }
        }
        for stats in accuracy_by_source.values_mut() {
            stats.accuracy = percent(stats.correct, stats.total);
        }

        Some(AccuracyReport {
            period_days: days,
            total_corrections: total,
            overall_accuracy: percent(correct, total),
            accuracy_by_source,
            improvement_opportunities: improvement_opportunities(&recent),
        })
    }

    /// Latency and volume over requests from the last `days` days
    ///
    /// Returns `None` when there are no requests in the window.
    pub fn performance_report(&self, days: u32) -> Option<PerformanceReport> {
        let cutoff = cutoff(days);
        let records = self.lock();
        let recent: Vec<&RequestMetric> = records
            .requests
            .iter()
            .filter(|m| m.timestamp > cutoff)
            .collect();

        if recent.is_empty() {
            return None;
        }

        let mut latencies: Vec<u64> = recent.iter().map(|m| m.latency_ms).collect();
        latencies.sort_unstable();

        let mut by_source: BTreeMap<Source, SourcePerformance> = BTreeMap::new();
        for m in &recent {
            let entry = by_source.entry(m.source).or_default();
            entry.total += 1;
            entry.avg_latency_ms += m.latency_ms as f64;
            entry.avg_confidence += m.confidence;
        }
        for stats in by_source.values_mut() {
            stats.avg_latency_ms /= stats.total as f64;
            stats.avg_confidence /= stats.total as f64;
        }

        Some(PerformanceReport {
            period_days: days,
            total_requests: recent.len(),
            avg_latency_ms: latencies.iter().sum::<u64>() as f64 / latencies.len() as f64,
            p50_latency_ms: percentile(&latencies, 50),
            p95_latency_ms: percentile(&latencies, 95),
            max_latency_ms: latencies.last().copied().unwrap_or(0),
            by_source,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append one record to the log file; failures are logged, not returned
    ///
    /// Callers hold the records lock so concurrent lines never interleave.
    fn append(&self, record: &LogRecord) {
        let Some(path) = &self.log_path else {
            return;
        };

        let written = serde_json::to_string(record)
            .map_err(crate::error::Error::from)
            .and_then(|line| {
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                file.write_all(format!("{}\n", line).as_bytes())?;
                Ok(())
            });

        if let Err(e) = written {
            warn!(path = %path.display(), "Failed to append analytics record: {}", e);
        }
    }
}

fn improvement_opportunities(corrections: &[&CorrectionRecord]) -> Vec<String> {
    let mut opportunities = Vec::new();

    let mut per_prediction: BTreeMap<Category, (usize, usize)> = BTreeMap::new();
    for c in corrections {
        let (total, wrong) = per_prediction.entry(c.ai_prediction).or_default();
        *total += 1;
        if !c.was_correct() {
            *wrong += 1;
        }
    }

    for (category, (total, wrong)) in per_prediction {
        if total < MIN_SAMPLES_FOR_ERROR_RATE {
            continue;
        }
        let error_rate = wrong as f64 / total as f64;
        if error_rate > HIGH_ERROR_RATE {
            opportunities.push(format!(
                "High error rate in '{}' category ({:.1}% - {}/{})",
                category,
                error_rate * 100.0,
                wrong,
                total
            ));
        }
    }

    let low_confidence_errors = corrections
        .iter()
        .filter(|c| !c.was_correct() && c.confidence < LOW_CONFIDENCE)
        .count();
    if low_confidence_errors as f64 > corrections.len() as f64 * LOW_CONFIDENCE_ERROR_SHARE {
        opportunities.push(format!(
            "Many low-confidence predictions are incorrect ({} cases)",
            low_confidence_errors
        ));
    }

    opportunities
}

fn cutoff(days: u32) -> DateTime<Utc> {
    Utc::now()
        .checked_sub_signed(chrono::Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn percentile(sorted: &[u64], p: usize) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = (sorted.len() * p / 100).min(sorted.len() - 1);
    sorted[idx]
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
