//! Phase Monitor
//!
//! Polls the container listing until the run reaches a terminal state:
//!
//! ```text
//! RUNNING ──► SUCCESS
//!    │  ├───► VERIFY_FAILURE
//!    │  ├───► INFRA_FAILURE
//!    │  └───► TIMEOUT
//!    └─ sleep(poll_interval) ─► RUNNING
//! ```
//!
//! Each tick reads the listing exactly once and every decision uses that
//! snapshot. The terminal decision itself is the pure [`evaluate_tick`].

use crate::monitor::resources::{parse_stats_output, ResourceAccumulator, ResourceSample, ResourceUsage};
use crate::monitor::status::{
    classify_role, parse_container_status, ContainerRole, ContainerStatus, ExpectedTopology,
    FailedContainer,
};
use crate::monitor::verification::{aggregate_container_logs, VerificationStats};
use crate::oracle::{ComposeClient, OracleError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Containers whose log tail is dumped on failure
const MAX_LOG_TAIL_CONTAINERS: usize = 5;

/// Lines per dumped log tail
const LOG_TAIL_LINES: usize = 50;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Failed to list containers: {0}")]
    ListContainers(#[source] OracleError),

    #[error("Failed to capture verification results: {0}")]
    Verification(#[source] OracleError),
}

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Timeout,
    #[serde(rename = "failure")]
    InfraFailure,
    #[serde(rename = "verification_failed")]
    VerifyFailure,
}

impl RunOutcome {
    /// Process exit code reported to CI
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::Timeout => 1,
            RunOutcome::InfraFailure => 2,
            RunOutcome::VerifyFailure => 3,
        }
    }

    /// Status string persisted in the metrics record
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::Timeout => "timeout",
            RunOutcome::InfraFailure => "failure",
            RunOutcome::VerifyFailure => "verification_failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one listing snapshot means for the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickDecision {
    /// A non-verify container exited non-zero
    InfraFailure(Vec<FailedContainer>),
    /// Only verify containers exited non-zero
    VerifyFailure(Vec<FailedContainer>),
    /// Sync and verify finished; verification results still decide the outcome
    Complete,
    TimedOut,
    Continue,
}

/// Decide the next state from one snapshot
///
/// Precedence: infrastructure failure, verify failure, completion, timeout.
pub fn evaluate_tick(status: &ContainerStatus, elapsed: Duration, timeout: Duration) -> TickDecision {
    let infra = status.infra_failures();
    if !infra.is_empty() {
        return TickDecision::InfraFailure(infra.into_iter().cloned().collect());
    }

    let verify = status.verify_failures();
    if !verify.is_empty() {
        return TickDecision::VerifyFailure(verify.into_iter().cloned().collect());
    }

    if status.is_complete() {
        return TickDecision::Complete;
    }

    if elapsed >= timeout {
        return TickDecision::TimedOut;
    }

    TickDecision::Continue
}

/// Accumulator owned by one monitor run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MonitorState {
    pub ticks: u32,
    pub resources: ResourceAccumulator,
    pub failed: bool,
}

impl MonitorState {
    #[must_use]
    pub fn record_tick(self) -> Self {
        Self {
            ticks: self.ticks + 1,
            ..self
        }
    }

    #[must_use]
    pub fn record_sample(self, sample: ResourceSample) -> Self {
        Self {
            resources: self.resources.observe(sample),
            ..self
        }
    }

    #[must_use]
    pub fn record_failure(self) -> Self {
        Self {
            failed: true,
            ..self
        }
    }
}

/// Everything the monitor learned, handed to the runner
#[derive(Debug, Clone)]
pub struct MonitorReport {
    pub outcome: RunOutcome,
    pub verification: VerificationStats,
    pub resources: ResourceUsage,
    pub failed: Vec<FailedContainer>,
    pub ticks: u32,
    /// Orchestrator wall clock; advisory only
    pub elapsed: Duration,
    pub last_status: ContainerStatus,
}

/// Polling loop over one compose project
pub struct PhaseMonitor<'a> {
    client: &'a ComposeClient<'a>,
    expected: ExpectedTopology,
    timeout: Duration,
    poll_interval: Duration,
}

impl<'a> PhaseMonitor<'a> {
    pub fn new(
        client: &'a ComposeClient<'a>,
        expected: ExpectedTopology,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            expected,
            timeout,
            poll_interval,
        }
    }

    /// Poll until terminal
    ///
    /// # Returns
    /// * `Ok(MonitorReport)` - The run reached a terminal state
    /// * `Err(MonitorError)` - The listing could not be read, or verification
    ///   results could not be captured after a completed run
    pub async fn run(&self) -> Result<MonitorReport, MonitorError> {
        let start = Instant::now();
        let mut state = MonitorState::default();

        info!(
            timeout_secs = self.timeout.as_secs(),
            poll_secs = self.poll_interval.as_secs(),
            workers = self.expected.workers,
            sync_containers = self.expected.sync_containers,
            "Waiting for containers to complete"
        );

        loop {
            let listing = self
                .client
                .list_containers()
                .await
                .map_err(MonitorError::ListContainers)?;
            let status =
                parse_container_status(&listing, self.client.project(), self.expected);

            state = state.record_tick();
            state = self.sample_resources(state, &status).await;

            let elapsed = start.elapsed();
            let decision = evaluate_tick(&status, elapsed, self.timeout);

            let (outcome, verification, failed) = match decision {
                TickDecision::Continue => {
                    info!(elapsed_secs = elapsed.as_secs(), "{}", status.progress());
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
                TickDecision::InfraFailure(failed) => {
                    error!(
                        containers = ?names(&failed),
                        "Container(s) exited with unexpected non-zero status"
                    );
                    self.log_tails(failed.iter().map(|c| c.name.as_str())).await;
                    let verification = self.capture_verification_best_effort().await;
                    state = state.record_failure();
                    (RunOutcome::InfraFailure, verification, failed)
                }
                TickDecision::VerifyFailure(failed) => {
                    let verification = self.capture_verification_best_effort().await;
                    error!(
                        containers = ?names(&failed),
                        "Verification failed: data mismatches detected"
                    );
                    self.log_tails(failed.iter().map(|c| c.name.as_str())).await;
                    state = state.record_failure();
                    (RunOutcome::VerifyFailure, verification, failed)
                }
                TickDecision::Complete => {
                    let verification = self
                        .capture_verification()
                        .await
                        .map_err(MonitorError::Verification)?;
                    if verification.has_discrepancies() {
                        error!(
                            missing = verification.missing,
                            mismatched = verification.mismatched,
                            "Verification failed: data mismatches detected"
                        );
                        state = state.record_failure();
                        (RunOutcome::VerifyFailure, verification, Vec::new())
                    } else {
                        info!(
                            matched = verification.matched,
                            "All tables verified successfully"
                        );
                        (RunOutcome::Success, verification, Vec::new())
                    }
                }
                TickDecision::TimedOut => {
                    error!(
                        timeout_secs = self.timeout.as_secs(),
                        progress = %status.progress(),
                        "Run did not complete within timeout"
                    );
                    self.log_timeout_diagnostics(&status).await;
                    let verification = self.capture_verification_best_effort().await;
                    state = state.record_failure();
                    (RunOutcome::Timeout, verification, Vec::new())
                }
            };

            info!(
                outcome = %outcome,
                ticks = state.ticks,
                failed = state.failed,
                elapsed_secs = elapsed.as_secs(),
                "Monitor reached terminal state"
            );

            return Ok(MonitorReport {
                outcome,
                verification,
                resources: state.resources.usage(),
                failed,
                ticks: state.ticks,
                elapsed,
                last_status: status,
            });
        }
    }

    /// Fold one resource sample in; failures are logged and skipped
    async fn sample_resources(&self, state: MonitorState, status: &ContainerStatus) -> MonitorState {
        if status.pending.is_empty() {
            return state;
        }

        let output = match self.client.stats(&status.pending).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Resource sampling failed, skipping tick");
                return state;
            }
        };

        match parse_stats_output(&output) {
            Ok(sample) => state.record_sample(sample),
            Err(e) => {
                warn!(error = %e, "Unparseable resource sample, skipping tick");
                state
            }
        }
    }

    /// Sum the verification lines of every verify container
    async fn capture_verification(&self) -> Result<VerificationStats, OracleError> {
        let verify: Vec<String> = self
            .client
            .container_names()
            .await?
            .into_iter()
            .filter(|name| {
                classify_role(name, self.client.project()) == ContainerRole::Verify
            })
            .collect();

        if verify.is_empty() {
            warn!("No verification containers found");
            return Ok(VerificationStats::default());
        }

        let mut logs = Vec::with_capacity(verify.len());
        for name in verify {
            let log = self.client.logs(&name).await?;
            logs.push((name, log));
        }

        if logs.iter().all(|(_, log)| log.trim().is_empty()) {
            warn!("No verification logs found, containers may not have run");
        }

        Ok(aggregate_container_logs(&logs))
    }

    async fn capture_verification_best_effort(&self) -> VerificationStats {
        match self.capture_verification().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Could not capture verification results");
                VerificationStats::default()
            }
        }
    }

    async fn log_tails<'n>(&self, containers: impl Iterator<Item = &'n str>) {
        for name in containers.take(MAX_LOG_TAIL_CONTAINERS) {
            match self.client.tail_logs(name, LOG_TAIL_LINES).await {
                Ok(tail) => error!(container = %name, "Log tail:\n{}", tail),
                Err(e) => warn!(container = %name, error = %e, "Could not read container logs"),
            }
        }
    }

    async fn log_timeout_diagnostics(&self, status: &ContainerStatus) {
        if status.pending.is_empty() {
            warn!("No containers still running at timeout");
            return;
        }
        warn!(containers = ?status.pending, "Containers still running at timeout");
        self.log_tails(status.pending.iter().map(String::as_str)).await;
    }
}

fn names(failed: &[FailedContainer]) -> Vec<&str> {
    failed.iter().map(|c| c.name.as_str()).collect()
}

#[cfg(test)]
#[path = "phase_test.rs"]
mod tests;
