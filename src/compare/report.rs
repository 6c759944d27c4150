//! Report rendering
//!
//! Markdown for PR comments and step summaries, JSON for machines.

use super::{ComparisonReport, InfoRow, MetricComparison};
use crate::timeline::{Timeline, TimelineEntry};
use std::fmt::Write as _;

const NO_VALUE: &str = "N/A";
const NO_BASELINE: &str = "-";

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}", v),
        None => NO_VALUE.to_string(),
    }
}

fn format_change(change: Option<f64>) -> String {
    match change {
        Some(c) => format!("{:+.1}%", c),
        None => NO_VALUE.to_string(),
    }
}

fn metric_row(comparison: &MetricComparison, has_baseline: bool) -> String {
    let (baseline, change, status) = if has_baseline {
        // no change means no verdict
        let status = match (comparison.change_percent, comparison.is_regression) {
            (None, _) => NO_BASELINE,
            (Some(_), true) => ":warning:",
            (Some(_), false) => ":white_check_mark:",
        };
        (
            format_value(comparison.baseline),
            format_change(comparison.change_percent),
            status,
        )
    } else {
        (
            NO_BASELINE.to_string(),
            NO_BASELINE.to_string(),
            NO_BASELINE,
        )
    };

    format!(
        "| {} | {} | {} | {} | {} |",
        comparison.name,
        format_value(comparison.current),
        baseline,
        change,
        status
    )
}

fn info_row(row: &InfoRow) -> String {
    let status = match row.flagged {
        None => "-",
        Some(true) => ":x:",
        Some(false) => ":white_check_mark:",
    };
    format!("| {} | {} | - | - | {} |", row.name, row.value, status)
}

fn timeline_row(entry: &TimelineEntry) -> String {
    let end = entry
        .end_sec
        .map(|e| format!("{:.1}s", e))
        .unwrap_or_else(|| "running".to_string());
    let duration = entry
        .duration_sec
        .map(|d| format!("{:.1}s", d))
        .unwrap_or_else(|| "-".to_string());
    let status = match (entry.is_finished(), entry.exit_code) {
        (false, _) => ":hourglass:",
        (true, 0) => ":white_check_mark:",
        (true, _) => ":x:",
    };

    format!(
        "| {} | {} | {:.1}s | {} | {} | {} |",
        entry.name, entry.role, entry.start_sec, end, duration, status
    )
}

/// Render the container timeline table; empty string for an empty timeline
pub fn render_timeline(timeline: &Timeline) -> String {
    if timeline.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    out.push_str("### Container Timeline\n\n");
    out.push_str("| Container | Type | Start | End | Duration | Status |\n");
    out.push_str("|-----------|------|-------|-----|----------|--------|\n");
    for entry in &timeline.containers {
        out.push_str(&timeline_row(entry));
        out.push('\n');
    }
    out
}

/// Render a comparison as markdown
pub fn render_markdown(report: &ComparisonReport) -> String {
    let has_baseline = report.has_baseline();
    let mut out = String::new();

    let _ = writeln!(out, "## Load Test Results: {}", report.source);
    out.push('\n');

    if let Some(notice) = report.baseline.notice() {
        let _ = writeln!(out, "{}", notice);
        out.push('\n');
    }
    if !has_baseline {
        out.push_str("_No baseline available for comparison_\n\n");
    }

    out.push_str("| Metric | Current | Baseline | Change | Status |\n");
    out.push_str("|--------|---------|----------|--------|--------|\n");
    for comparison in &report.comparisons {
        out.push_str(&metric_row(comparison, has_baseline));
        out.push('\n');
    }
    for row in &report.info {
        out.push_str(&info_row(row));
        out.push('\n');
    }
    out.push('\n');

    let _ = writeln!(out, "**Status**: {}", report.status);
    if !report.git_sha.is_empty() {
        let _ = writeln!(out, "**Commit**: {} ({})", report.git_sha, report.git_ref);
    }

    let timeline = render_timeline(&report.timeline);
    if !timeline.is_empty() {
        out.push('\n');
        out.push_str(&timeline);
    }

    out
}

/// Render a comparison as pretty JSON
pub fn render_json(report: &ComparisonReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
