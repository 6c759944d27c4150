//! Baseline eligibility
//!
//! A baseline only makes sense when it ran the same workload. Records are
//! compared on source, preset, row count and table count, in that order.

use crate::record::{MetricsRecord, RecordError};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// First configuration field on which a baseline differs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaselineMismatch {
    pub field: &'static str,
    pub current: String,
    pub baseline: String,
}

impl fmt::Display for BaselineMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "_Baseline {} mismatch: current={}, baseline={} - skipping comparison_",
            self.field, self.current, self.baseline
        )
    }
}

/// What happened to the baseline in a comparison pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BaselineStatus {
    Missing,
    Skipped(BaselineMismatch),
    Used { git_sha: String, git_ref: String },
}

impl BaselineStatus {
    pub fn used(baseline: &MetricsRecord) -> Self {
        BaselineStatus::Used {
            git_sha: baseline.git_sha.clone(),
            git_ref: baseline.git_ref.clone(),
        }
    }

    /// Markdown notice for a skipped baseline
    pub fn notice(&self) -> Option<String> {
        match self {
            BaselineStatus::Skipped(mismatch) => Some(mismatch.to_string()),
            _ => None,
        }
    }
}

fn mismatch(field: &'static str, current: impl ToString, baseline: impl ToString) -> BaselineMismatch {
    BaselineMismatch {
        field,
        current: current.to_string(),
        baseline: baseline.to_string(),
    }
}

/// Check that `baseline` ran the same workload as `current`
pub fn check_eligibility(current: &MetricsRecord, baseline: &MetricsRecord) -> Result<(), BaselineMismatch> {
    if current.source != baseline.source {
        return Err(mismatch("source", &current.source, &baseline.source));
    }
    check_preset(&current.preset, baseline)?;
    if current.row_count != baseline.row_count {
        return Err(mismatch("row_count", current.row_count, baseline.row_count));
    }
    if current.table_count != baseline.table_count {
        return Err(mismatch("table_count", current.table_count, baseline.table_count));
    }
    Ok(())
}

/// Check only the preset, for callers that know the preset but not the record
pub fn check_preset(preset: &str, baseline: &MetricsRecord) -> Result<(), BaselineMismatch> {
    if preset != baseline.preset {
        return Err(mismatch("preset", preset, &baseline.preset));
    }
    Ok(())
}

/// Load an optional baseline
///
/// A path that does not exist means "no baseline"; a file that exists but
/// cannot be parsed is an error.
pub fn load_optional(path: &Path) -> Result<Option<MetricsRecord>, RecordError> {
    if !path.exists() {
        return Ok(None);
    }
    MetricsRecord::read_from(path).map(Some)
}
