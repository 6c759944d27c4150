//! CI runner: one load test, end to end
//!
//! ```text
//! initial cleanup ─► compose up ─► PhaseMonitor ─► inspect ─► timeline
//!        ─► durations ─► metrics.json / metrics.prom ─► logs ─► final cleanup
//! ```
//!
//! Final cleanup runs on every path out of [`CiRunner::run`]. A failed run
//! with preserve-on-failure keeps its containers for debugging.

use crate::config::ResolvedConfig;
use crate::monitor::{MonitorError, MonitorReport, PhaseMonitor, RunOutcome};
use crate::oracle::{CommandOracle, ComposeClient, OracleError};
use crate::record::logs::{collect_container_logs, LogSummary};
use crate::record::{assemble_metrics, MetricsRecord, RecordError, RunIdentity, RunObservations};
use crate::telemetry::{write_prometheus_file, TelemetryError};
use crate::timeline::{
    build_timeline, derive_durations, parse_inspect_output, ContainerRecord, DurationError,
    PhaseDurations, Timeline, TimelineError,
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Exit code for anything that stopped the pipeline itself
pub const ORCHESTRATION_ERROR_EXIT_CODE: i32 = 4;

/// Label carried by every resource a load test creates
pub const RESOURCE_LABEL: &str = "com.surreal-loadtest";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Compose file not found: {0}")]
    ComposeFileMissing(PathBuf),

    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start containers: {0}")]
    Start(#[source] OracleError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error("Failed to inspect containers: {0}")]
    Inspect(#[source] OracleError),

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error(transparent)]
    Durations(#[from] DurationError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        ORCHESTRATION_ERROR_EXIT_CODE
    }
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub record: MetricsRecord,
    pub ticks: u32,
    /// None when log collection found nothing or failed
    pub logs: Option<LogSummary>,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }
}

/// Containers as seen after the monitor returned
#[derive(Debug, Default)]
struct Snapshot {
    names: Vec<String>,
    records: Vec<ContainerRecord>,
}

/// Drives one load test against a compose project
pub struct CiRunner<'a> {
    oracle: &'a dyn CommandOracle,
    config: ResolvedConfig,
}

impl<'a> CiRunner<'a> {
    pub fn new(oracle: &'a dyn CommandOracle, config: ResolvedConfig) -> Self {
        Self { oracle, config }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Run the whole pipeline
    ///
    /// # Returns
    /// * `Ok(RunReport)` - The run reached a terminal outcome and its record was written
    /// * `Err(RunError)` - The pipeline itself failed (exit code 4)
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let client = ComposeClient::new(
            self.oracle,
            &self.config.compose_file,
            self.config.project.as_str(),
        );

        info!(
            source = %self.config.source,
            preset = %self.config.preset,
            row_count = self.config.row_count,
            workers = self.config.workers,
            tables = self.config.table_count(),
            expected_sync = self.config.expected_sync_containers(),
            timeout_secs = self.config.timeout.as_secs(),
            preserve_on_failure = self.config.preserve_on_failure,
            "Starting load test"
        );

        if self.config.skip_cleanup {
            info!("Skipping initial cleanup");
        } else {
            self.initial_cleanup(&client).await;
        }

        let result = self.execute(&client).await;

        let failed = match &result {
            Ok(report) => !report.outcome.is_success(),
            Err(e) => {
                error!(error = %e, "Load test aborted");
                true
            }
        };
        self.final_cleanup(&client, failed).await;

        result
    }

    async fn execute(&self, client: &ComposeClient<'_>) -> Result<RunReport, RunError> {
        if !self.config.compose_file.exists() {
            return Err(RunError::ComposeFileMissing(self.config.compose_file.clone()));
        }
        std::fs::create_dir_all(&self.config.output_dir).map_err(|source| RunError::OutputDir {
            path: self.config.output_dir.clone(),
            source,
        })?;

        info!(compose_file = %self.config.compose_file.display(), "Starting containers");
        client.up().await.map_err(RunError::Start)?;

        let monitor = PhaseMonitor::new(
            client,
            self.config.expected_topology(),
            self.config.timeout,
            self.config.poll_interval,
        );
        let report = monitor.run().await?;
        let outcome = report.outcome;

        let snapshot = match self.snapshot(client).await {
            Ok(snapshot) => snapshot,
            Err(e) if outcome.is_success() => return Err(e),
            Err(e) => {
                warn!(error = %e, outcome = %outcome, "Container data unavailable, timeline left empty");
                Snapshot::default()
            }
        };

        let timeline = build_timeline(&snapshot.records, &self.config.project);
        let durations = self.durations(&timeline, outcome)?;

        let identity = self.identity().await;
        let record = assemble_metrics(
            &self.config,
            identity,
            RunObservations {
                outcome,
                durations,
                verification: report.verification,
                resources: report.resources,
                timeline,
            },
        );

        self.persist(&record, &report)?;
        let logs = self.collect_logs(client, &snapshot).await;

        info!(
            outcome = %outcome,
            exit_code = outcome.exit_code(),
            throughput = ?record.results.throughput_rows_per_sec,
            matched = record.verification.matched,
            mismatched = record.verification.mismatched,
            "Load test complete"
        );

        Ok(RunReport {
            outcome,
            record,
            ticks: report.ticks,
            logs,
        })
    }

    /// Names and inspect records of every project container
    async fn snapshot(&self, client: &ComposeClient<'_>) -> Result<Snapshot, RunError> {
        let names = client.container_names().await.map_err(RunError::Inspect)?;
        if names.is_empty() {
            return Ok(Snapshot::default());
        }
        let json = client.inspect(&names).await.map_err(RunError::Inspect)?;
        let records = parse_inspect_output(&json, &self.config.project)?;
        debug!(containers = names.len(), started = records.len(), "Captured container records");
        Ok(Snapshot { names, records })
    }

    /// Derive phase durations
    ///
    /// A successful run must yield durations. Any other outcome records them
    /// as absent when derivation fails.
    fn durations(
        &self,
        timeline: &Timeline,
        outcome: RunOutcome,
    ) -> Result<Option<PhaseDurations>, RunError> {
        match derive_durations(&timeline.containers) {
            Ok(durations) => Ok(Some(durations)),
            Err(e) if outcome.is_success() => Err(e.into()),
            Err(e) => {
                warn!(error = %e, outcome = %outcome, "Durations not recorded");
                Ok(None)
            }
        }
    }

    /// Commit identity: configuration first, then the local checkout
    async fn identity(&self) -> RunIdentity {
        let git_sha = match &self.config.git_sha {
            Some(sha) => sha.clone(),
            None => self.git(&["rev-parse", "--short", "HEAD"]).await,
        };
        let git_ref = match &self.config.git_ref {
            Some(r) => r.clone(),
            None => self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await,
        };
        RunIdentity::new(git_sha, git_ref)
    }

    async fn git(&self, args: &[&str]) -> String {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        match self.oracle.run("git", &args).await {
            Ok(output) if output.success() => output.stdout.trim().to_string(),
            Ok(output) => {
                debug!(status = output.status, "git identity unavailable");
                String::new()
            }
            Err(e) => {
                debug!(error = %e, "git identity unavailable");
                String::new()
            }
        }
    }

    fn persist(&self, record: &MetricsRecord, report: &MonitorReport) -> Result<(), RunError> {
        let metrics_path = self.config.metrics_path();
        record.write_to(&metrics_path)?;
        info!(path = %metrics_path.display(), "Metrics written");

        let prom_path = self.config.prometheus_path();
        write_prometheus_file(record, report.ticks, &prom_path)?;
        debug!(path = %prom_path.display(), "Prometheus metrics written");
        Ok(())
    }

    async fn collect_logs(
        &self,
        client: &ComposeClient<'_>,
        snapshot: &Snapshot,
    ) -> Option<LogSummary> {
        let dir = self.config.logs_dir();
        match collect_container_logs(client, &snapshot.names, &snapshot.records, &dir).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, dir = %dir.display(), "Failed to collect container logs");
                None
            }
        }
    }

    async fn docker(&self, args: &[&str]) -> Result<String, OracleError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        Ok(self.oracle.run("docker", &args).await?.stdout)
    }

    async fn compose_down(&self, client: &ComposeClient<'_>) {
        if !client.compose_file().exists() {
            return;
        }
        if let Err(e) = client.down().await {
            warn!(error = %e, "compose down failed");
        }
    }

    /// Remove leftovers of earlier runs; every step is best-effort
    async fn initial_cleanup(&self, client: &ComposeClient<'_>) {
        info!("Cleaning up resources of previous runs");
        self.compose_down(client).await;

        let filter = format!("label={}", RESOURCE_LABEL);
        match self.docker(&["ps", "-aq", "--filter", filter.as_str()]).await {
            Ok(output) => {
                let ids: Vec<&str> = output
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .collect();
                if !ids.is_empty() {
                    let mut args = vec!["rm", "-f"];
                    args.extend(ids.iter().copied());
                    if let Err(e) = self.docker(&args).await {
                        warn!(error = %e, "Failed to remove leftover containers");
                    }
                }
            }
            Err(e) => warn!(error = %e, "Failed to list leftover containers"),
        }

        let network = format!("{}_default", self.config.project);
        let steps: [&[&str]; 3] = [
            &["network", "rm", network.as_str()],
            &["network", "prune", "-f", "--filter", filter.as_str()],
            &["volume", "prune", "-f", "--filter", filter.as_str()],
        ];
        for args in steps {
            if let Err(e) = self.docker(args).await {
                warn!(error = %e, command = %args.join(" "), "Cleanup step failed");
            }
        }

        info!("Initial cleanup complete");
    }

    async fn final_cleanup(&self, client: &ComposeClient<'_>, failed: bool) {
        if failed && self.config.preserve_on_failure {
            let compose = format!(
                "docker-compose -f {} -p {}",
                self.config.compose_file.display(),
                self.config.project
            );
            warn!("Resources preserved for debugging");
            info!("Inspect with: {} ps -a", compose);
            info!("Logs with: {} logs <service>", compose);
            info!("Clean up with: {} down -v --remove-orphans", compose);
            return;
        }

        info!("Cleaning up compose resources");
        self.compose_down(client).await;
    }
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;
