//! Multi-source summary
//!
//! Walks a directory of per-source artifacts (`metrics-<source>/metrics.json`)
//! and concatenates one comparison per source, each against the matching
//! directory under an optional baseline tree.

use super::baseline::{check_preset, load_optional};
use super::{compare, render_markdown, CompareError};
use crate::record::MetricsRecord;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const METRICS_DIR_PREFIX: &str = "metrics-";
const METRICS_FILE: &str = "metrics.json";

/// Rendered summary and the combined verdict
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutcome {
    pub markdown: String,
    pub has_regression: bool,
    /// Number of sources that had a metrics file
    pub sources: usize,
}

fn source_dirs(metrics_dir: &Path) -> Result<Vec<PathBuf>, CompareError> {
    let entries = std::fs::read_dir(metrics_dir).map_err(|source| CompareError::ReadDir {
        path: metrics_dir.to_path_buf(),
        source,
    })?;

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(METRICS_DIR_PREFIX))
        })
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Load the baseline for one source directory, applying the preset check
///
/// Returns the usable baseline and an optional notice for the summary.
fn load_baseline(
    baseline_dir: Option<&Path>,
    dir_name: &std::ffi::OsStr,
    preset: &str,
) -> (Option<MetricsRecord>, Option<String>) {
    let Some(baseline_dir) = baseline_dir else {
        return (None, None);
    };
    let path = baseline_dir.join(dir_name).join(METRICS_FILE);

    match load_optional(&path) {
        Ok(Some(baseline)) => match check_preset(preset, &baseline) {
            Ok(()) => (Some(baseline), None),
            Err(mismatch) => (None, Some(mismatch.to_string())),
        },
        Ok(None) => {
            debug!(path = %path.display(), "No baseline for source");
            (None, None)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable baseline");
            (None, None)
        }
    }
}

/// Generate the combined markdown summary
///
/// # Arguments
/// * `metrics_dir` - Directory holding `metrics-<source>` subdirectories
/// * `baseline_dir` - Optional tree with the same layout
/// * `preset` - Preset the current runs used; baselines with another preset are skipped
/// * `threshold` - Regression threshold in percent
///
/// # Errors
/// Returns an error when `metrics_dir` does not exist or cannot be listed.
/// A source whose own metrics cannot be read is reported inline and skipped.
pub fn generate_summary(
    metrics_dir: &Path,
    baseline_dir: Option<&Path>,
    preset: &str,
    threshold: f64,
) -> Result<SummaryOutcome, CompareError> {
    if !metrics_dir.is_dir() {
        return Err(CompareError::MissingMetricsDir(metrics_dir.to_path_buf()));
    }

    let mut markdown = String::new();
    let mut has_regression = false;
    let mut sources = 0;

    for dir in source_dirs(metrics_dir)? {
        let metrics_path = dir.join(METRICS_FILE);
        if !metrics_path.exists() {
            debug!(dir = %dir.display(), "Skipping directory without metrics");
            continue;
        }
        let Some(dir_name) = dir.file_name() else {
            continue;
        };
        let label = dir_name
            .to_string_lossy()
            .trim_start_matches(METRICS_DIR_PREFIX)
            .to_string();
        sources += 1;

        markdown.push_str(&format!("### Source: {}\n\n", label));

        let current = match MetricsRecord::read_from(&metrics_path) {
            Ok(record) => record,
            Err(e) => {
                warn!(source = %label, error = %e, "Failed to load metrics");
                markdown.push_str(&format!("_Failed to load metrics: {}_\n\n", e));
                continue;
            }
        };

        let (baseline, notice) = load_baseline(baseline_dir, dir_name, preset);
        if let Some(notice) = notice {
            markdown.push_str(&notice);
            markdown.push_str("\n\n");
        }

        let report = compare(&current, baseline.as_ref(), threshold);
        has_regression |= report.has_regression;
        markdown.push_str(&render_markdown(&report));
        markdown.push('\n');
    }

    if sources == 0 {
        markdown.push_str("_No metrics found_\n");
    }

    Ok(SummaryOutcome {
        markdown,
        has_regression,
        sources,
    })
}
