//! docker-compose / docker command lines on top of a [`CommandOracle`]

use super::{display_command, CommandOracle, CommandOutput, OracleError};
use std::path::{Path, PathBuf};

/// Default compose binary
pub const COMPOSE_PROGRAM: &str = "docker-compose";

/// Default docker binary
pub const DOCKER_PROGRAM: &str = "docker";

/// Format used for resource sampling: name, memory usage, CPU percentage
pub const STATS_FORMAT: &str = "{{.Name}}\t{{.MemUsage}}\t{{.CPUPerc}}";

/// Typed wrapper issuing the queries the orchestrator needs
///
/// Holds only borrowed state; cheap to construct per run.
pub struct ComposeClient<'a> {
    oracle: &'a dyn CommandOracle,
    compose_file: PathBuf,
    project: String,
}

impl<'a> ComposeClient<'a> {
    pub fn new(
        oracle: &'a dyn CommandOracle,
        compose_file: impl Into<PathBuf>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            oracle,
            compose_file: compose_file.into(),
            project: project.into(),
        }
    }

    pub fn compose_file(&self) -> &Path {
        &self.compose_file
    }

    /// Compose project name; container names are prefixed with it
    pub fn project(&self) -> &str {
        &self.project
    }

    fn compose_args(&self, extra: &[&str]) -> Vec<String> {
        let mut args = vec!["-f".to_string(), self.compose_file.display().to_string()];
        if !self.project.is_empty() {
            args.push("-p".to_string());
            args.push(self.project.clone());
        }
        args.extend(extra.iter().map(|a| a.to_string()));
        args
    }

    async fn compose(&self, extra: &[&str]) -> Result<CommandOutput, OracleError> {
        self.oracle
            .run(COMPOSE_PROGRAM, &self.compose_args(extra))
            .await
    }

    async fn docker(&self, args: &[&str]) -> Result<CommandOutput, OracleError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.oracle.run(DOCKER_PROGRAM, &args).await
    }

    /// Start every service in the background
    pub async fn up(&self) -> Result<(), OracleError> {
        let args = self.compose_args(&["up", "-d"]);
        let command = display_command(COMPOSE_PROGRAM, &args);
        self.oracle
            .run(COMPOSE_PROGRAM, &args)
            .await?
            .into_checked(&command)?;
        Ok(())
    }

    /// Tear down services, volumes and orphans
    pub async fn down(&self) -> Result<(), OracleError> {
        let args = self.compose_args(&["down", "-v", "--remove-orphans"]);
        let command = display_command(COMPOSE_PROGRAM, &args);
        self.oracle
            .run(COMPOSE_PROGRAM, &args)
            .await?
            .into_checked(&command)?;
        Ok(())
    }

    /// Raw `ps -a` listing, the Status Classifier's input
    pub async fn list_containers(&self) -> Result<String, OracleError> {
        let args = self.compose_args(&["ps", "-a"]);
        let command = display_command(COMPOSE_PROGRAM, &args);
        let output = self
            .oracle
            .run(COMPOSE_PROGRAM, &args)
            .await?
            .into_checked(&command)?;
        Ok(output.stdout)
    }

    /// Names of every container of the project, running or not
    pub async fn container_names(&self) -> Result<Vec<String>, OracleError> {
        let args = self.compose_args(&["ps", "-a", "--format", "{{.Names}}"]);
        let command = display_command(COMPOSE_PROGRAM, &args);
        let output = self
            .oracle
            .run(COMPOSE_PROGRAM, &args)
            .await?
            .into_checked(&command)?;

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Full log of one container (stdout and stderr)
    pub async fn logs(&self, container: &str) -> Result<String, OracleError> {
        Ok(self.docker(&["logs", container]).await?.combined())
    }

    /// Full log of one container with the two streams kept apart
    pub async fn log_streams(&self, container: &str) -> Result<CommandOutput, OracleError> {
        self.docker(&["logs", container]).await
    }

    /// Last `lines` lines of one container's log
    pub async fn tail_logs(&self, container: &str, lines: usize) -> Result<String, OracleError> {
        let tail = lines.to_string();
        Ok(self
            .docker(&["logs", container, "--tail", &tail])
            .await?
            .combined())
    }

    /// One-shot resource snapshot for the given containers
    pub async fn stats(&self, containers: &[String]) -> Result<String, OracleError> {
        let mut args = vec![
            "stats".to_string(),
            "--no-stream".to_string(),
            "--format".to_string(),
            STATS_FORMAT.to_string(),
        ];
        args.extend(containers.iter().cloned());
        let command = display_command(DOCKER_PROGRAM, &args);
        let output = self
            .oracle
            .run(DOCKER_PROGRAM, &args)
            .await?
            .into_checked(&command)?;
        Ok(output.stdout)
    }

    /// `docker inspect` JSON for the given containers
    pub async fn inspect(&self, containers: &[String]) -> Result<String, OracleError> {
        let mut args = vec!["inspect".to_string()];
        args.extend(containers.iter().cloned());
        let command = display_command(DOCKER_PROGRAM, &args);
        let output = self
            .oracle
            .run(DOCKER_PROGRAM, &args)
            .await?
            .into_checked(&command)?;
        Ok(output.stdout)
    }

    /// Borrow the underlying oracle for commands outside docker
    pub fn oracle(&self) -> &'a dyn CommandOracle {
        self.oracle
    }
}
