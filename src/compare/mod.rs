//! Regression Comparator
//!
//! Compares a current [`MetricsRecord`] against an optional baseline record,
//! metric by metric, with direction-aware thresholds:
//! - Throughput: higher is better, regression when it drops by more than the threshold
//! - Durations and peak memory: lower is better, regression when they grow by more
//!
//! A regression is a verdict, not an error.

pub mod baseline;
pub mod report;
pub mod summary;

use crate::monitor::{RunOutcome, VerificationStats};
use crate::record::MetricsRecord;
use crate::timeline::Timeline;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

pub use baseline::{check_eligibility, BaselineMismatch, BaselineStatus};
pub use report::{render_json, render_markdown};
pub use summary::{generate_summary, SummaryOutcome};

/// Default regression threshold in percent
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 10.0;

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("Metrics directory not found: {0}")]
    MissingMetricsDir(PathBuf),

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Record(#[from] crate::record::RecordError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The fixed set of compared metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedMetric {
    Throughput,
    Duration,
    SyncDuration,
    PeakMemory,
}

impl TrackedMetric {
    pub const ALL: [TrackedMetric; 4] = [
        TrackedMetric::Throughput,
        TrackedMetric::Duration,
        TrackedMetric::SyncDuration,
        TrackedMetric::PeakMemory,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TrackedMetric::Throughput => "Throughput (rows/sec)",
            TrackedMetric::Duration => "Duration (sec)",
            TrackedMetric::SyncDuration => "Sync Duration (sec)",
            TrackedMetric::PeakMemory => "Peak Memory (MB)",
        }
    }

    pub fn higher_is_better(&self) -> bool {
        matches!(self, TrackedMetric::Throughput)
    }

    /// Read this metric from a record; None when the record has no value
    pub fn value(&self, record: &MetricsRecord) -> Option<f64> {
        match self {
            TrackedMetric::Throughput => record.results.throughput_rows_per_sec,
            TrackedMetric::Duration => record.results.total_duration_seconds,
            TrackedMetric::SyncDuration => record.results.sync_duration_seconds,
            TrackedMetric::PeakMemory => record.resources.peak_memory_mb,
        }
    }
}

/// Relative change in percent
///
/// None when either side is missing or the baseline is zero.
pub fn change_percent(current: Option<f64>, baseline: Option<f64>) -> Option<f64> {
    match (current, baseline) {
        (Some(current), Some(baseline)) if baseline != 0.0 => {
            Some((current - baseline) / baseline * 100.0)
        }
        _ => None,
    }
}

/// Whether the change crosses the threshold in the bad direction
///
/// Always false when the change is undefined.
pub fn is_regression(
    current: Option<f64>,
    baseline: Option<f64>,
    threshold: f64,
    higher_is_better: bool,
) -> bool {
    match change_percent(current, baseline) {
        Some(change) if higher_is_better => change < -threshold,
        Some(change) => change > threshold,
        None => false,
    }
}

/// One metric, current against baseline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub name: String,
    pub current: Option<f64>,
    pub baseline: Option<f64>,
    pub change_percent: Option<f64>,
    pub is_regression: bool,
    pub higher_is_better: bool,
}

/// Compare every tracked metric
pub fn compare_values(
    current: &MetricsRecord,
    baseline: Option<&MetricsRecord>,
    threshold: f64,
) -> Vec<MetricComparison> {
    TrackedMetric::ALL
        .iter()
        .map(|metric| {
            let current_value = metric.value(current);
            let baseline_value = baseline.and_then(|b| metric.value(b));
            MetricComparison {
                name: metric.label().to_string(),
                current: current_value,
                baseline: baseline_value,
                change_percent: change_percent(current_value, baseline_value),
                is_regression: is_regression(
                    current_value,
                    baseline_value,
                    threshold,
                    metric.higher_is_better(),
                ),
                higher_is_better: metric.higher_is_better(),
            }
        })
        .collect()
}

/// Informational row without regression semantics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoRow {
    pub name: String,
    pub value: u64,
    /// Some(true) marks a problem, None means the row carries no verdict
    pub flagged: Option<bool>,
}

fn info_rows(verification: &VerificationStats) -> Vec<InfoRow> {
    vec![
        InfoRow {
            name: "Rows Verified".to_string(),
            value: verification.matched,
            flagged: None,
        },
        InfoRow {
            name: "Missing".to_string(),
            value: verification.missing,
            flagged: Some(verification.missing > 0),
        },
        InfoRow {
            name: "Mismatches".to_string(),
            value: verification.mismatched,
            flagged: Some(verification.mismatched > 0),
        },
    ]
}

/// Result of one comparison pass
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub source: String,
    pub threshold: f64,
    pub baseline: BaselineStatus,
    pub comparisons: Vec<MetricComparison>,
    pub info: Vec<InfoRow>,
    pub status: RunOutcome,
    pub git_sha: String,
    pub git_ref: String,
    pub has_regression: bool,
    #[serde(skip)]
    pub timeline: Timeline,
}

impl ComparisonReport {
    pub fn has_baseline(&self) -> bool {
        matches!(self.baseline, BaselineStatus::Used { .. })
    }

    pub fn regressions(&self) -> impl Iterator<Item = &MetricComparison> {
        self.comparisons.iter().filter(|c| c.is_regression)
    }
}

/// Compare `current` against `baseline`
///
/// An ineligible baseline (different source, preset, row count or table
/// count) is reported as skipped and the comparison proceeds as if there
/// were none.
pub fn compare(
    current: &MetricsRecord,
    baseline: Option<&MetricsRecord>,
    threshold: f64,
) -> ComparisonReport {
    let (status, usable) = match baseline {
        None => (BaselineStatus::Missing, None),
        Some(candidate) => match check_eligibility(current, candidate) {
            Ok(()) => (BaselineStatus::used(candidate), Some(candidate)),
            Err(mismatch) => (BaselineStatus::Skipped(mismatch), None),
        },
    };

    let comparisons = compare_values(current, usable, threshold);
    let has_regression = comparisons.iter().any(|c| c.is_regression);

    ComparisonReport {
        source: current.source.clone(),
        threshold,
        baseline: status,
        comparisons,
        info: info_rows(&current.verification),
        status: current.results.status,
        git_sha: current.git_sha.clone(),
        git_ref: current.git_ref.clone(),
        has_regression,
        timeline: current.timeline.clone(),
    }
}

#[cfg(test)]
#[path = "compare_test.rs"]
mod tests;
