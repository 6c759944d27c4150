//! Status Classifier
//!
//! Turns raw `docker-compose ps -a` text into typed per-role counts and a
//! failure set. Containers that have not exited yet are ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Functional category of a container in the workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRole {
    Populate,
    Sync,
    Verify,
    Infra,
    Unknown,
}

impl ContainerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerRole::Populate => "populate",
            ContainerRole::Sync => "sync",
            ContainerRole::Verify => "verify",
            ContainerRole::Infra => "infra",
            ContainerRole::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ContainerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_number(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Classify a container by the structure of its name
///
/// Compose names look like `<project>-<service>-<replica>`. The project
/// prefix is stripped first and the service is matched from its start:
/// - `output-populate-1-1` → Populate (`populate` followed by a worker number)
/// - `output-sync-1`, `output-sync-users-1` → Sync
/// - `output-verify-2-1` → Verify (`verify` followed by a worker number)
/// - `output-kafka-1`, `output-schema-init-1` → Infra
/// - anything without a numeric replica suffix → Unknown
///
/// Total: every input maps to exactly one role.
pub fn classify_role(name: &str, project: &str) -> ContainerRole {
    let service = display_name(name.trim(), project);
    let tokens: Vec<&str> = service.split('-').collect();

    match tokens.as_slice() {
        ["populate", worker, ..] if is_number(worker) => ContainerRole::Populate,
        ["verify", worker, ..] if is_number(worker) => ContainerRole::Verify,
        ["sync", rest, ..] if !rest.is_empty() => ContainerRole::Sync,
        [first, .., last] if !first.is_empty() && is_number(last) => ContainerRole::Infra,
        _ => ContainerRole::Unknown,
    }
}

/// Strip the compose project prefix for display
///
/// Display only: ordering and duration math always use the raw name.
pub fn display_name<'a>(name: &'a str, project: &str) -> &'a str {
    let name = name.trim_start_matches('/');
    if project.is_empty() {
        return name;
    }
    name.strip_prefix(project)
        .and_then(|rest| rest.strip_prefix('-'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(name)
}

/// Extract the exit code from a status segment containing `Exited (<code>)`
///
/// Returns None for running, created or pending containers.
pub fn parse_exit_code(line: &str) -> Option<i32> {
    let start = line.find("Exited (")? + "Exited (".len();
    let rest = &line[start..];
    let end = rest.find(')')?;
    rest[..end].trim().parse().ok()
}

/// How many containers of each role must finish for the run to complete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpectedTopology {
    /// Populate and verify containers (one of each per worker)
    pub workers: usize,
    /// Sync containers (one, or one per table depending on the source)
    pub sync_containers: usize,
}

/// A container that exited with a non-zero status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedContainer {
    pub name: String,
    pub role: ContainerRole,
    pub exit_code: i32,
}

/// One classified listing snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStatus {
    pub populate_done: usize,
    pub sync_done: usize,
    pub verify_done: usize,
    pub infra_done: usize,
    pub failed: Vec<FailedContainer>,
    /// Containers listed but not exited (running, created, restarting)
    pub pending: Vec<String>,
    pub expected: ExpectedTopology,
}

impl ContainerStatus {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Failed containers outside the verify role (infrastructure crashes)
    pub fn infra_failures(&self) -> Vec<&FailedContainer> {
        self.failed
            .iter()
            .filter(|c| c.role != ContainerRole::Verify)
            .collect()
    }

    /// Failed verify containers (data verification failed)
    pub fn verify_failures(&self) -> Vec<&FailedContainer> {
        self.failed
            .iter()
            .filter(|c| c.role == ContainerRole::Verify)
            .collect()
    }

    /// Sync phase done and every verify worker done
    pub fn is_complete(&self) -> bool {
        self.sync_done >= self.expected.sync_containers
            && self.verify_done >= self.expected.workers
    }

    /// One-line progress summary for logs
    pub fn progress(&self) -> String {
        let expected = &self.expected;
        format!(
            "Populate: {}/{}, Sync: {}/{}, Verify: {}/{}",
            self.populate_done,
            expected.workers,
            self.sync_done,
            expected.sync_containers,
            self.verify_done,
            expected.workers
        )
    }
}

/// Parse a `docker-compose ps -a` listing
///
/// # Arguments
/// * `listing` - Raw multi-line listing; first token of each line is the name
/// * `project` - Compose project name, stripped before classification
/// * `expected` - Expected topology, carried on the result for completion checks
///
/// # Returns
/// Per-role success counts and every container that exited non-zero
pub fn parse_container_status(
    listing: &str,
    project: &str,
    expected: ExpectedTopology,
) -> ContainerStatus {
    let mut status = ContainerStatus {
        expected,
        ..Default::default()
    };

    for line in listing.lines() {
        let Some(name) = line.split_whitespace().next() else {
            continue;
        };
        let role = classify_role(name, project);
        if role == ContainerRole::Unknown {
            continue;
        }

        match parse_exit_code(line) {
            Some(0) => match role {
                ContainerRole::Populate => status.populate_done += 1,
                ContainerRole::Sync => status.sync_done += 1,
                ContainerRole::Verify => status.verify_done += 1,
                ContainerRole::Infra => status.infra_done += 1,
                ContainerRole::Unknown => {}
            },
            Some(exit_code) => status.failed.push(FailedContainer {
                name: name.to_string(),
                role,
                exit_code,
            }),
            None => status.pending.push(name.to_string()),
        }
    }

    status
}

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
