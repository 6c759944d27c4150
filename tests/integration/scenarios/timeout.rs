//! Timeout - a sync container never finishes

use super::{kafka_project, with_container, PROJECT};
use crate::integration::framework::compose::SimulatedCompose;
use crate::integration::framework::{assertions, TestContext, TestResult, TestScenario};
use crate::integration::TestConfig;
use loadtest_ci::config::RunArgs;
use loadtest_ci::monitor::RunOutcome;
use loadtest_ci::CiRunner;

pub struct TimeoutScenario;

#[async_trait::async_trait]
impl TestScenario for TimeoutScenario {
    fn name(&self) -> &str {
        "timeout"
    }

    async fn run(&self, ctx: &mut TestContext) -> TestResult {
        let config = ctx.resolved(self.name(), |args| RunArgs {
            timeout: Some(60),
            no_preserve_on_failure: true,
            ..args
        })?;
        // verify waits for every sync container, so it never starts
        let containers = with_container(kafka_project(40, 42), "sync-users-1", |c| c.starts(2));
        let containers = with_container(containers, "verify-1-1", |c| c.starts(3600));
        let containers = with_container(containers, "verify-2-1", |c| c.starts(3600));
        let compose = SimulatedCompose::new(PROJECT, containers);

        println!("⏳ Waiting for a sync container that never exits...");
        let report = CiRunner::new(&compose, config.clone()).run().await?;

        assertions::assert_outcome(&report, RunOutcome::Timeout)?;
        let record = assertions::assert_metrics_persisted(&config, &report)?;

        // polled at 0, 5, ..., 60 seconds
        if report.ticks != 13 {
            return Err(format!("expected 13 ticks, got {}", report.ticks).into());
        }
        assertions::assert_duration("sync", record.results.sync_duration_seconds, None)?;

        // verify never started, so it is not on the timeline
        let names: Vec<&str> = record
            .timeline
            .containers
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        if names.iter().any(|n| n.starts_with("verify")) {
            return Err(format!("unstarted containers on timeline: {:?}", names).into());
        }
        let still_running = record
            .timeline
            .containers
            .iter()
            .find(|c| c.name == "sync-users-1")
            .ok_or("sync-users-1 missing from timeline")?;
        if still_running.end_sec.is_some() || still_running.duration_sec.is_some() {
            return Err("a running container must have no end or duration".into());
        }

        // preserve-on-failure disabled: final cleanup ran
        let downs = compose.count_calls("down -v --remove-orphans");
        if downs != 2 {
            return Err(format!("expected 2 compose down calls, got {}", downs).into());
        }

        Ok(())
    }

    fn should_skip(&self, config: &TestConfig) -> bool {
        !config.scenarios.timeout
    }
}
