//! Command oracle: the narrow seam to the container runtime
//!
//! Everything the orchestrator learns about containers comes from running an
//! external command and reading its stdout/stderr/exit code. The
//! [`CommandOracle`] trait is that seam:
//! - [`ProcessOracle`] runs real processes with `tokio::process`
//! - tests substitute a scripted double with deterministic output

pub mod compose;

#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

pub use compose::ComposeClient;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {status}: {stderr}")]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
}

/// Captured result of one external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Process exit code (-1 when terminated by a signal)
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// stdout followed by stderr, the way `docker logs` interleaves both streams
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        if self.stdout.is_empty() {
            return self.stderr.clone();
        }
        format!("{}\n{}", self.stdout.trim_end_matches('\n'), self.stderr)
    }

    /// Convert a non-zero exit into [`OracleError::Failed`]
    pub fn into_checked(self, command: &str) -> Result<Self, OracleError> {
        if self.success() {
            Ok(self)
        } else {
            Err(OracleError::Failed {
                command: command.to_string(),
                status: self.status,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Render a program and its arguments as a single display string
pub fn display_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Synchronous-looking query interface to the container runtime
///
/// Each call blocks the single control thread until the external command
/// returns. A non-zero exit code is NOT an error at this layer: callers
/// decide whether the exit status matters (`docker logs` of a crashed
/// container still carries useful output).
#[async_trait]
pub trait CommandOracle: Send + Sync {
    /// Oracle name for logging
    fn name(&self) -> &'static str;

    /// Run `program` with `args` and capture its output
    ///
    /// # Returns
    /// * `Ok(CommandOutput)` - The command ran (whatever its exit code)
    /// * `Err(OracleError)` - The command could not be run at all
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, OracleError>;
}

/// Oracle backed by real child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessOracle {
    working_dir: Option<std::path::PathBuf>,
}

impl ProcessOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every command from `dir`
    pub fn with_working_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl CommandOracle for ProcessOracle {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, OracleError> {
        let command = display_command(program, args);
        debug!(command = %command, "Running command");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|source| OracleError::Spawn {
            command: command.clone(),
            source,
        })?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
