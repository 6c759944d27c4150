//! Metrics record
//!
//! The persisted unit of comparison. One record per run, written as pretty
//! JSON to `<output-dir>/metrics.json` and later read back as a baseline.

use crate::config::{ResolvedConfig, DEFAULT_TABLES};
use crate::monitor::{ResourceUsage, RunOutcome, VerificationStats};
use crate::timeline::{throughput, PhaseDurations, Timeline};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Platform label recorded with every run
pub const PLATFORM: &str = "docker-compose";

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid metrics JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize metrics: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn default_table_count() -> usize {
    DEFAULT_TABLES.len()
}

/// Outcome and derived numbers of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    pub status: RunOutcome,
    pub exit_code: i32,
    pub total_duration_seconds: Option<f64>,
    pub populate_duration_seconds: Option<f64>,
    pub sync_duration_seconds: Option<f64>,
    pub verify_duration_seconds: Option<f64>,
    pub rows_synced: u64,
    pub throughput_rows_per_sec: Option<f64>,
}

/// One run, as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    #[serde(default)]
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub git_sha: String,
    #[serde(default)]
    pub git_ref: String,
    pub source: String,
    pub preset: String,
    pub row_count: u64,
    #[serde(default = "default_table_count")]
    pub table_count: usize,
    #[serde(default)]
    pub tables: Vec<String>,
    pub workers: usize,
    pub platform: String,
    pub runner: String,
    pub results: RunResults,
    #[serde(default)]
    pub resources: ResourceUsage,
    #[serde(default)]
    pub verification: VerificationStats,
    #[serde(default)]
    pub timeline: Timeline,
}

impl MetricsRecord {
    /// Read a record from disk
    pub fn read_from(path: &Path) -> Result<Self, RecordError> {
        let contents = std::fs::read_to_string(path).map_err(|source| RecordError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| RecordError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the record as pretty JSON
    pub fn write_to(&self, path: &Path) -> Result<(), RecordError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json + "\n").map_err(|source| RecordError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn outcome(&self) -> RunOutcome {
        self.results.status
    }
}

/// Who ran, when, and on which commit
#[derive(Debug, Clone, PartialEq)]
pub struct RunIdentity {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub git_sha: String,
    pub git_ref: String,
}

impl RunIdentity {
    /// Fresh identity stamped now
    pub fn new(git_sha: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            git_sha: git_sha.into(),
            git_ref: git_ref.into(),
        }
    }
}

/// Everything observed about a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct RunObservations {
    pub outcome: RunOutcome,
    /// None when derivation was not possible for a failed run
    pub durations: Option<PhaseDurations>,
    pub verification: VerificationStats,
    pub resources: ResourceUsage,
    pub timeline: Timeline,
}

/// Combine configuration, identity and observations into one record
///
/// Pure: no clock, no I/O. Throughput is absent whenever durations are.
pub fn assemble_metrics(
    config: &ResolvedConfig,
    identity: RunIdentity,
    observations: RunObservations,
) -> MetricsRecord {
    let durations = observations.durations;
    let throughput = durations.map(|d| throughput(config.row_count, config.table_count(), &d));

    MetricsRecord {
        run_id: identity.run_id,
        timestamp: identity.timestamp,
        git_sha: identity.git_sha,
        git_ref: identity.git_ref,
        source: config.source.to_string(),
        preset: config.preset.to_string(),
        row_count: config.row_count,
        table_count: config.table_count(),
        tables: config.tables.clone(),
        workers: config.workers,
        platform: PLATFORM.to_string(),
        runner: config.runner_label.clone(),
        results: RunResults {
            status: observations.outcome,
            exit_code: observations.outcome.exit_code(),
            total_duration_seconds: durations.map(|d| d.total),
            populate_duration_seconds: durations.map(|d| d.populate),
            sync_duration_seconds: durations.map(|d| d.sync),
            verify_duration_seconds: durations.map(|d| d.verify),
            rows_synced: config.rows_synced(),
            throughput_rows_per_sec: throughput,
        },
        resources: observations.resources,
        verification: observations.verification,
        timeline: observations.timeline,
    }
}

#[cfg(test)]
#[path = "metrics_test.rs"]
mod tests;
