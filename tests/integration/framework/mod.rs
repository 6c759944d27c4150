//! Integration test framework for loadtest-ci
//!
//! Provides infrastructure for end-to-end runs without a container runtime:
//! - Simulated compose project answering docker/docker-compose commands
//! - Per-scenario output directories in a temporary workspace
//! - Assertions over run reports and written artifacts

#![allow(dead_code)] // Test framework - fields/functions used across different scenarios

pub mod assertions;
pub mod compose;

use loadtest_ci::config::{resolve, FileConfig, RunArgs};
use loadtest_ci::ResolvedConfig;
use serde::Deserialize;
use std::error::Error;
use std::path::PathBuf;

pub type TestResult = Result<(), Box<dyn Error>>;

/// Test configuration loaded from config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct TestConfig {
    pub scenarios: ScenarioConfig,
    pub run: RunConfig,
    pub comparison: ComparisonConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    pub successful_run: bool,
    pub infra_failure: bool,
    pub verify_failure: bool,
    pub timeout: bool,
    pub baseline_regression: bool,
    pub custom_project: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub source: String,
    pub tables: Vec<String>,
    pub row_count: u64,
    pub workers: usize,
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonConfig {
    pub threshold_percent: f64,
}

impl TestConfig {
    /// Load configuration from tests/integration/config.toml
    pub fn load() -> Result<Self, Box<dyn Error>> {
        let config_path = "tests/integration/config.toml";
        let contents = std::fs::read_to_string(config_path)?;
        let config: TestConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}

/// Test context holds shared state across scenarios
pub struct TestContext {
    pub workspace: tempfile::TempDir,
    pub config: TestConfig,
}

impl TestContext {
    /// Create new test context
    pub async fn new(config: &TestConfig) -> Result<Self, Box<dyn Error>> {
        let workspace = tempfile::Builder::new().prefix("loadtest-it-").tempdir()?;
        Ok(Self {
            workspace,
            config: config.clone(),
        })
    }

    /// Output directory of one scenario, with an empty compose file in place
    pub fn run_dir(&self, scenario: &str) -> Result<PathBuf, Box<dyn Error>> {
        let dir = self.workspace.path().join(scenario);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("docker-compose.loadtest.yml"), "services: {}\n")?;
        Ok(dir)
    }

    /// Resolved run settings for one scenario
    ///
    /// `overrides` is applied to the flags built from config.toml.
    pub fn resolved(
        &self,
        scenario: &str,
        overrides: impl FnOnce(RunArgs) -> RunArgs,
    ) -> Result<ResolvedConfig, Box<dyn Error>> {
        let dir = self.run_dir(scenario)?;
        let run = &self.config.run;
        let args = RunArgs {
            source: Some(run.source.clone()),
            tables: Some(run.tables.clone()),
            row_count: Some(run.row_count),
            workers: Some(run.workers),
            timeout: Some(run.timeout_secs),
            poll_interval: Some(run.poll_interval_secs),
            output_dir: Some(dir.clone()),
            compose_file: Some(dir.join("docker-compose.loadtest.yml")),
            git_sha: Some("abc1234".to_string()),
            git_ref: Some("main".to_string()),
            ..RunArgs::default()
        };
        Ok(resolve(overrides(args), FileConfig::default(), |_| None)?)
    }

    /// Cleanup test resources
    pub async fn cleanup(self) -> Result<(), Box<dyn Error>> {
        self.workspace.close()?;
        Ok(())
    }
}

/// Trait for test scenarios
#[async_trait::async_trait]
pub trait TestScenario: Send + Sync {
    /// Name of the scenario
    fn name(&self) -> &str;

    /// Run the scenario
    async fn run(&self, ctx: &mut TestContext) -> TestResult;

    /// Check if scenario should be skipped
    fn should_skip(&self, config: &TestConfig) -> bool;
}
