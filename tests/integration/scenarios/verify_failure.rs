//! Verification failure - a verify worker reports missing rows

use super::{kafka_project, with_container, PROJECT};
use crate::integration::framework::compose::SimulatedCompose;
use crate::integration::framework::{assertions, TestContext, TestResult, TestScenario};
use crate::integration::TestConfig;
use loadtest_ci::monitor::RunOutcome;
use loadtest_ci::CiRunner;

pub struct VerifyFailureScenario;

#[async_trait::async_trait]
impl TestScenario for VerifyFailureScenario {
    fn name(&self) -> &str {
        "verify_failure"
    }

    async fn run(&self, ctx: &mut TestContext) -> TestResult {
        let config = ctx.resolved(self.name(), |args| args)?;
        let containers = with_container(kafka_project(40, 42), "verify-2-1", |c| {
            c.exits(1)
                .logs("Table users: 997 matched, 3 missing, 0 mismatched\n")
        });
        let compose = SimulatedCompose::new(PROJECT, containers);

        println!("🔍 Running with 3 missing rows...");
        let report = CiRunner::new(&compose, config.clone()).run().await?;

        assertions::assert_outcome(&report, RunOutcome::VerifyFailure)?;
        let record = assertions::assert_metrics_persisted(&config, &report)?;

        let verification = record.verification;
        if verification.matched != 1997 || verification.missing != 3 {
            return Err(format!("unexpected verification: {:?}", verification).into());
        }

        // every sync container finished, so durations are still recorded
        assertions::assert_duration("sync", record.results.sync_duration_seconds, Some(40.0))?;
        assertions::assert_duration("total", record.results.total_duration_seconds, Some(50.0))?;

        assertions::assert_log_summary(&config, 8, 1)?;
        Ok(())
    }

    fn should_skip(&self, config: &TestConfig) -> bool {
        !config.scenarios.verify_failure
    }
}
