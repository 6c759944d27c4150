//! Assertion helpers for load test run validation

use loadtest_ci::monitor::RunOutcome;
use loadtest_ci::record::logs::LogSummary;
use loadtest_ci::record::MetricsRecord;
use loadtest_ci::{ResolvedConfig, RunReport};
use std::error::Error;

/// Assert the run reached the expected terminal outcome
pub fn assert_outcome(report: &RunReport, expected: RunOutcome) -> Result<(), Box<dyn Error>> {
    if report.outcome != expected {
        return Err(format!(
            "expected outcome {}, got {} (exit code {})",
            expected,
            report.outcome,
            report.exit_code()
        )
        .into());
    }
    if report.exit_code() != expected.exit_code() {
        return Err(format!(
            "outcome {} must exit with {}, got {}",
            expected,
            expected.exit_code(),
            report.exit_code()
        )
        .into());
    }

    println!("✅ Outcome {} (exit code {})", report.outcome, report.exit_code());
    Ok(())
}

/// Assert metrics.json exists and reads back as the reported record
pub fn assert_metrics_persisted(
    config: &ResolvedConfig,
    report: &RunReport,
) -> Result<MetricsRecord, Box<dyn Error>> {
    let path = config.metrics_path();
    let persisted = MetricsRecord::read_from(&path)?;

    if persisted != report.record {
        return Err(format!("{} does not match the reported record", path.display()).into());
    }
    if !config.prometheus_path().exists() {
        return Err(format!("{} was not written", config.prometheus_path().display()).into());
    }

    println!("✅ Metrics persisted to {}", path.display());
    Ok(persisted)
}

/// Assert an optional duration equals the expected value
pub fn assert_duration(
    name: &str,
    actual: Option<f64>,
    expected: Option<f64>,
) -> Result<(), Box<dyn Error>> {
    let matches = match (actual, expected) {
        (Some(a), Some(e)) => (a - e).abs() < 1e-9,
        (None, None) => true,
        _ => false,
    };
    if !matches {
        return Err(format!("{}: expected {:?}, got {:?}", name, expected, actual).into());
    }

    println!("✅ {} = {:?}", name, actual);
    Ok(())
}

/// Assert containers.json was written with the expected counts
pub fn assert_log_summary(
    config: &ResolvedConfig,
    total: usize,
    failed: usize,
) -> Result<(), Box<dyn Error>> {
    let path = config.logs_dir().join("containers.json");
    let contents = std::fs::read_to_string(&path)?;
    let summary: LogSummary = serde_json::from_str(&contents)?;

    if summary.total_containers != total || summary.failed_containers != failed {
        return Err(format!(
            "log summary: expected {} containers / {} failed, got {} / {}",
            total, failed, summary.total_containers, summary.failed_containers
        )
        .into());
    }
    if failed > 0 && !summary.containers.first().is_some_and(|c| c.failed) {
        return Err("failed containers must be listed first".into());
    }

    println!("✅ Log summary: {} containers, {} failed", total, failed);
    Ok(())
}
