//! Compare one metrics record against an optional baseline
//!
//! Usage: compare-metrics <current.json> [baseline.json]
//!
//! Environment:
//!   THRESHOLD      Regression threshold in percent (default: 10)
//!   OUTPUT_FORMAT  markdown | json (default: markdown)
//!
//! Exit codes: 0 no regression, 1 regression, 2 invalid input

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use loadtest_ci::compare::baseline::load_optional;
use loadtest_ci::compare::{compare, render_json, render_markdown, DEFAULT_THRESHOLD_PERCENT};
use loadtest_ci::record::MetricsRecord;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "compare-metrics")]
#[command(about = "Compare load test metrics against a baseline")]
struct Args {
    /// Metrics of the current run
    current: PathBuf,

    /// Baseline metrics; a path that does not exist means no baseline
    baseline: Option<PathBuf>,

    /// Regression threshold in percent
    #[arg(long, env = "THRESHOLD", default_value_t = DEFAULT_THRESHOLD_PERCENT)]
    threshold: f64,

    #[arg(long, env = "OUTPUT_FORMAT", value_enum, ignore_case = true, default_value = "markdown")]
    format: OutputFormat,
}

/// Returns whether a regression was detected
fn run(args: &Args) -> anyhow::Result<bool> {
    let current = MetricsRecord::read_from(&args.current)?;
    let baseline = match &args.baseline {
        Some(path) => load_optional(path)?,
        None => None,
    };

    let report = compare(&current, baseline.as_ref(), args.threshold);
    let output = match args.format {
        OutputFormat::Markdown => render_markdown(&report),
        OutputFormat::Json => render_json(&report).context("Failed to render JSON report")?,
    };
    println!("{}", output);

    if report.has_regression {
        warn!(
            threshold = args.threshold,
            "WARNING: Performance regression detected (threshold: {}%)",
            args.threshold
        );
    }
    Ok(report.has_regression)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(1),
        Err(e) => {
            error!(error = %format!("{:#}", e), "Comparison failed");
            ExitCode::from(2)
        }
    }
}
