//! Custom project name - compose runs under `-p` and roles ignore the prefix
//!
//! The project name contains `sync`, so only the service part of each
//! container name may decide its role.

use super::{kafka_project, with_container};
use crate::integration::framework::compose::SimulatedCompose;
use crate::integration::framework::{assertions, TestContext, TestResult, TestScenario};
use crate::integration::TestConfig;
use loadtest_ci::monitor::{ContainerRole, RunOutcome};
use loadtest_ci::CiRunner;

const CUSTOM_PROJECT: &str = "loadtest-sync";

pub struct CustomProjectScenario;

#[async_trait::async_trait]
impl TestScenario for CustomProjectScenario {
    fn name(&self) -> &str {
        "custom_project"
    }

    async fn run(&self, ctx: &mut TestContext) -> TestResult {
        let config = ctx.resolved(self.name(), |args| loadtest_ci::RunArgs {
            project: Some(CUSTOM_PROJECT.to_string()),
            ..args
        })?;
        let containers = with_container(kafka_project(40, 42), "verify-1-1", |c| {
            c.exits(1)
                .logs("Table orders: 990 matched, 0 missing, 10 mismatched\n")
        });
        let compose = SimulatedCompose::new(CUSTOM_PROJECT, containers);

        println!("🏷️  Running under project {}...", CUSTOM_PROJECT);
        let report = CiRunner::new(&compose, config.clone()).run().await?;

        // a failed verify worker stays a verification failure
        assertions::assert_outcome(&report, RunOutcome::VerifyFailure)?;
        let record = assertions::assert_metrics_persisted(&config, &report)?;

        if record.verification.mismatched != 10 {
            return Err(format!("unexpected verification: {:?}", record.verification).into());
        }

        let roles = |role: ContainerRole| {
            record
                .timeline
                .containers
                .iter()
                .filter(|entry| entry.role == role)
                .count()
        };
        let counts = (
            roles(ContainerRole::Populate),
            roles(ContainerRole::Sync),
            roles(ContainerRole::Verify),
            roles(ContainerRole::Infra),
        );
        if counts != (2, 2, 2, 2) {
            return Err(format!("roles (populate, sync, verify, infra): {:?}", counts).into());
        }
        if let Some(entry) = record
            .timeline
            .containers
            .iter()
            .find(|entry| entry.name.starts_with(CUSTOM_PROJECT))
        {
            return Err(format!("project prefix kept in timeline: {}", entry.name).into());
        }

        let compose_calls: Vec<String> = compose
            .calls()
            .into_iter()
            .filter(|call| call.starts_with("docker-compose"))
            .collect();
        let flag = format!("-p {}", CUSTOM_PROJECT);
        if let Some(call) = compose_calls.iter().find(|call| !call.contains(&flag)) {
            return Err(format!("compose called without {}: {}", flag, call).into());
        }

        assertions::assert_log_summary(&config, 8, 1)?;
        Ok(())
    }

    fn should_skip(&self, config: &TestConfig) -> bool {
        !config.scenarios.custom_project
    }
}
