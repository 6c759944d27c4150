use clap::Parser;
use loadtest_ci::oracle::ProcessOracle;
use loadtest_ci::{resolve_from_args, CiRunner, RunError, RunReport, RunArgs};
use loadtest_ci::ORCHESTRATION_ERROR_EXIT_CODE;
use std::process::ExitCode;
use tracing::{error, info};

/// Map the pipeline result to the process exit code
///
/// - 0 success, 1 timeout, 2 infrastructure failure, 3 verification failure
/// - 4 when the pipeline itself failed
pub fn exit_code_for(result: &Result<RunReport, RunError>) -> u8 {
    let code = match result {
        Ok(report) => report.exit_code(),
        Err(e) => e.exit_code(),
    };
    u8::try_from(code).unwrap_or(ORCHESTRATION_ERROR_EXIT_CODE as u8)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = RunArgs::parse();
    let config = match resolve_from_args(args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::from(ORCHESTRATION_ERROR_EXIT_CODE as u8);
        }
    };

    let oracle = ProcessOracle::new();
    let runner = CiRunner::new(&oracle, config);
    let result = runner.run().await;

    let code = exit_code_for(&result);
    match &result {
        Ok(report) => info!(
            status = %report.outcome,
            exit_code = code,
            metrics = %runner.config().metrics_path().display(),
            "Load test finished"
        ),
        Err(e) => error!(error = %e, exit_code = code, "Load test failed"),
    }

    ExitCode::from(code)
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
