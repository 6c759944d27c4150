//! Simulated compose project
//!
//! A [`CommandOracle`] that plays a scripted container lifecycle against
//! tokio's clock. Every container has a start and an optional finish offset
//! (seconds after `up -d`); listings, stats, inspect output and logs are
//! derived from the elapsed time when the command runs.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use loadtest_ci::oracle::{display_command, CommandOracle, CommandOutput, OracleError};
use serde_json::json;
use std::sync::Mutex;
use tokio::time::Instant;

const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

/// One simulated container
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Service part of the name; the project prefix is added by the simulation
    pub service: String,
    pub start_secs: u64,
    pub finish_secs: Option<u64>,
    pub exit_code: i32,
    pub logs: String,
    pub memory_mib: u64,
}

impl ContainerSpec {
    /// Container that starts with the project and never exits
    pub fn service(service: &str) -> Self {
        Self {
            service: service.to_string(),
            start_secs: 0,
            finish_secs: None,
            exit_code: 0,
            logs: String::new(),
            memory_mib: 128,
        }
    }

    /// Runs from `start` to `finish` seconds after `up -d`
    pub fn runs(mut self, start: u64, finish: u64) -> Self {
        self.start_secs = start;
        self.finish_secs = Some(finish);
        self
    }

    /// Starts at `start` and never finishes
    pub fn starts(mut self, start: u64) -> Self {
        self.start_secs = start;
        self.finish_secs = None;
        self
    }

    pub fn exits(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn logs(mut self, logs: &str) -> Self {
        self.logs = logs.to_string();
        self
    }

    pub fn memory(mut self, mib: u64) -> Self {
        self.memory_mib = mib;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Running,
    Exited,
}

/// Compose project simulated on tokio's clock
pub struct SimulatedCompose {
    project: String,
    containers: Vec<ContainerSpec>,
    wall_clock_base: DateTime<Utc>,
    started: Mutex<Option<Instant>>,
    calls: Mutex<Vec<String>>,
}

impl SimulatedCompose {
    pub fn new(project: &str, containers: Vec<ContainerSpec>) -> Self {
        Self {
            project: project.to_string(),
            containers,
            wall_clock_base: Utc
                .with_ymd_and_hms(2026, 1, 13, 12, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
            started: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every command line run so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count_calls(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(pattern)).count()
    }

    fn full_name(&self, spec: &ContainerSpec) -> String {
        format!("{}-{}", self.project, spec.service)
    }

    fn elapsed_secs(&self) -> Option<u64> {
        let started = self.started.lock().ok()?;
        started.map(|s| s.elapsed().as_secs())
    }

    fn phase(&self, spec: &ContainerSpec) -> Phase {
        let Some(elapsed) = self.elapsed_secs() else {
            return Phase::Created;
        };
        if elapsed < spec.start_secs {
            return Phase::Created;
        }
        match spec.finish_secs {
            Some(finish) if elapsed >= finish => Phase::Exited,
            _ => Phase::Running,
        }
    }

    fn timestamp(&self, offset_secs: u64) -> String {
        let at = self.wall_clock_base + chrono::Duration::seconds(offset_secs as i64);
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn find(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| self.full_name(c) == name)
    }

    fn listing(&self) -> String {
        let elapsed = self.elapsed_secs().unwrap_or(0);
        let mut out = String::from("NAME                          STATUS\n");
        for spec in &self.containers {
            let status = match self.phase(spec) {
                Phase::Created => "Created".to_string(),
                Phase::Running => format!("Up {} seconds", elapsed - spec.start_secs),
                Phase::Exited => format!(
                    "Exited ({}) {} seconds ago",
                    spec.exit_code,
                    elapsed - spec.finish_secs.unwrap_or(elapsed)
                ),
            };
            out.push_str(&format!("{:<30}{}\n", self.full_name(spec), status));
        }
        out
    }

    fn names(&self) -> String {
        self.containers
            .iter()
            .map(|c| self.full_name(c) + "\n")
            .collect()
    }

    fn stats(&self, requested: &[String]) -> String {
        requested
            .iter()
            .filter_map(|name| self.find(name))
            .filter(|spec| self.phase(spec) == Phase::Running)
            .map(|spec| {
                format!(
                    "{}\t{}MiB / 4GiB\t25.00%\n",
                    self.full_name(spec),
                    spec.memory_mib
                )
            })
            .collect()
    }

    fn inspect(&self, requested: &[String]) -> String {
        let entries: Vec<serde_json::Value> = requested
            .iter()
            .filter_map(|name| self.find(name))
            .map(|spec| {
                let phase = self.phase(spec);
                let started_at = match phase {
                    Phase::Created => ZERO_TIME.to_string(),
                    _ => self.timestamp(spec.start_secs),
                };
                let (status, finished_at) = match (phase, spec.finish_secs) {
                    (Phase::Exited, Some(finish)) => ("exited", self.timestamp(finish)),
                    (Phase::Running, _) => ("running", ZERO_TIME.to_string()),
                    _ => ("created", ZERO_TIME.to_string()),
                };
                json!({
                    "Name": format!("/{}", self.full_name(spec)),
                    "State": {
                        "Status": status,
                        "Running": phase == Phase::Running,
                        "ExitCode": if phase == Phase::Exited { spec.exit_code } else { 0 },
                        "StartedAt": started_at,
                        "FinishedAt": finished_at,
                    }
                })
            })
            .collect();
        serde_json::Value::Array(entries).to_string()
    }

    fn logs(&self, name: &str) -> String {
        self.find(name)
            .filter(|spec| self.phase(spec) != Phase::Created)
            .map(|spec| spec.logs.clone())
            .unwrap_or_default()
    }
}

/// Split `-f <file>` / `-p <project>` off a compose command line
fn split_compose_flags<'a, 'b>(args: &'b [&'a str]) -> (Option<&'a str>, &'b [&'a str]) {
    let mut project = None;
    let mut rest = args;
    loop {
        match rest {
            ["-f", _, tail @ ..] => rest = tail,
            ["-p", name, tail @ ..] => {
                project = Some(*name);
                rest = tail;
            }
            _ => return (project, rest),
        }
    }
}

#[async_trait]
impl CommandOracle for SimulatedCompose {
    fn name(&self) -> &'static str {
        "simulated-compose"
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, OracleError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(display_command(program, args));
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        if program == "docker-compose" {
            let (project, command) = split_compose_flags(&args);
            // compose run against another project sees none of our containers
            if project != Some(self.project.as_str()) {
                return Ok(CommandOutput::ok(""));
            }
            let output = match command {
                ["up", "-d"] => {
                    if let Ok(mut started) = self.started.lock() {
                        *started = Some(Instant::now());
                    }
                    CommandOutput::ok("")
                }
                ["ps", "-a", "--format", _] => CommandOutput::ok(self.names()),
                ["ps", "-a"] => CommandOutput::ok(self.listing()),
                _ => CommandOutput::ok(""),
            };
            return Ok(output);
        }

        let output = match (program, args.as_slice()) {
            ("docker", ["stats", "--no-stream", "--format", _, rest @ ..]) => {
                let requested: Vec<String> = rest.iter().map(|s| s.to_string()).collect();
                CommandOutput::ok(self.stats(&requested))
            }
            ("docker", ["inspect", rest @ ..]) => {
                let requested: Vec<String> = rest.iter().map(|s| s.to_string()).collect();
                CommandOutput::ok(self.inspect(&requested))
            }
            ("docker", ["logs", name, "--tail", _]) | ("docker", ["logs", name]) => {
                CommandOutput::ok(self.logs(name))
            }
            ("git", _) => CommandOutput::failed(128, "fatal: not a git repository"),
            _ => CommandOutput::ok(""),
        };
        Ok(output)
    }
}
