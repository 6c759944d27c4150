//! Successful run - every phase completes and verification is clean

use super::{kafka_project, PROJECT};
use crate::integration::framework::compose::SimulatedCompose;
use crate::integration::framework::{assertions, TestContext, TestResult, TestScenario};
use crate::integration::TestConfig;
use loadtest_ci::monitor::RunOutcome;
use loadtest_ci::CiRunner;

pub struct SuccessfulRunScenario;

#[async_trait::async_trait]
impl TestScenario for SuccessfulRunScenario {
    fn name(&self) -> &str {
        "successful_run"
    }

    async fn run(&self, ctx: &mut TestContext) -> TestResult {
        let config = ctx.resolved(self.name(), |args| args)?;
        let compose = SimulatedCompose::new(PROJECT, kafka_project(40, 42));

        println!("📦 Running load test against simulated project...");
        let report = CiRunner::new(&compose, config.clone()).run().await?;

        assertions::assert_outcome(&report, RunOutcome::Success)?;
        let record = assertions::assert_metrics_persisted(&config, &report)?;

        let results = &record.results;
        assertions::assert_duration("total", results.total_duration_seconds, Some(50.0))?;
        assertions::assert_duration("populate", results.populate_duration_seconds, Some(22.0))?;
        assertions::assert_duration("sync", results.sync_duration_seconds, Some(40.0))?;
        assertions::assert_duration("verify", results.verify_duration_seconds, Some(8.0))?;
        assertions::assert_duration("throughput", results.throughput_rows_per_sec, Some(50.0))?;

        if record.verification.matched != 2000 || record.verification.has_discrepancies() {
            return Err(format!("unexpected verification: {:?}", record.verification).into());
        }
        if record.resources.peak_memory_mb.is_none() {
            return Err("peak memory was not sampled".into());
        }
        if record.timeline.containers.len() != 8 {
            return Err(format!(
                "expected 8 timeline entries, got {}",
                record.timeline.containers.len()
            )
            .into());
        }

        assertions::assert_log_summary(&config, 8, 0)?;

        // initial cleanup and final cleanup
        let downs = compose.count_calls("down -v --remove-orphans");
        if downs != 2 {
            return Err(format!("expected 2 compose down calls, got {}", downs).into());
        }

        Ok(())
    }

    fn should_skip(&self, config: &TestConfig) -> bool {
        !config.scenarios.successful_run
    }
}
