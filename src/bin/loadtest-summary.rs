//! Combined markdown summary over every source's metrics
//!
//! Exit codes: 0 no regression, 1 any source regressed, 2 missing metrics directory

use clap::Parser;
use loadtest_ci::compare::{generate_summary, CompareError, DEFAULT_THRESHOLD_PERCENT};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "loadtest-summary")]
#[command(about = "Generate a load test summary across all sources")]
struct Args {
    /// Directory holding metrics-<source>/metrics.json
    #[arg(long)]
    metrics_dir: PathBuf,

    /// Preset the current runs used
    #[arg(long)]
    preset: String,

    /// Directory holding baseline metrics in the same layout
    #[arg(long)]
    baseline_dir: Option<PathBuf>,

    /// Write the summary here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Regression threshold in percent
    #[arg(long, env = "THRESHOLD", default_value_t = DEFAULT_THRESHOLD_PERCENT)]
    threshold: f64,
}

fn run(args: &Args) -> Result<bool, CompareError> {
    let baseline_dir = args.baseline_dir.as_deref().filter(|dir| {
        let exists = dir.is_dir();
        if !exists {
            info!(dir = %dir.display(), "Baseline directory not found, comparing without baseline");
        }
        exists
    });

    let summary = generate_summary(&args.metrics_dir, baseline_dir, &args.preset, args.threshold)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &summary.markdown).map_err(|source| CompareError::Write {
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), sources = summary.sources, "Summary written");
        }
        None => print!("{}", summary.markdown),
    }

    if summary.has_regression {
        warn!(
            threshold = args.threshold,
            "WARNING: Performance regression detected (threshold: {}%)",
            args.threshold
        );
    }
    Ok(summary.has_regression)
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
            error!(error = %e, "Summary failed");
            ExitCode::from(2)
        }
    }
}
