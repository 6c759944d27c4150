//! Container log collection
//!
//! Writes `<name>.stdout.log` / `<name>.stderr.log` for every container of
//! the project plus a `containers.json` summary, so a failed CI run can be
//! debugged from its artifacts after the containers are gone.

use crate::monitor::status::{classify_role, ContainerRole};
use crate::oracle::{ComposeClient, OracleError};
use crate::timeline::ContainerRecord;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const SUMMARY_FILE: &str = "containers.json";

#[derive(Debug, Error)]
pub enum LogCollectionError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("Failed to serialize container summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One container in `containers.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub role: ContainerRole,
    pub status: String,
    /// None when the container never exited
    pub exit_code: Option<i32>,
    pub failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSummary {
    pub total_containers: usize,
    pub failed_containers: usize,
    pub containers: Vec<ContainerSummary>,
}

/// Summarise containers, failed ones first, then by name
///
/// Containers missing from `records` never started; their role comes from
/// the name with the `project` prefix stripped.
pub fn summarize_containers(
    names: &[String],
    records: &[ContainerRecord],
    project: &str,
) -> LogSummary {
    let mut containers: Vec<ContainerSummary> = names
        .iter()
        .map(|name| match records.iter().find(|r| &r.name == name) {
            Some(record) => {
                let exit_code = record.finished_at.map(|_| record.exit_code);
                ContainerSummary {
                    name: name.clone(),
                    role: record.role,
                    status: record.exit_status.clone(),
                    exit_code,
                    failed: exit_code.is_some_and(|code| code != 0),
                }
            }
            None => ContainerSummary {
                name: name.clone(),
                role: classify_role(name, project),
                status: "created".to_string(),
                exit_code: None,
                failed: false,
            },
        })
        .collect();

    containers.sort_by(|a, b| b.failed.cmp(&a.failed).then_with(|| a.name.cmp(&b.name)));

    LogSummary {
        total_containers: containers.len(),
        failed_containers: containers.iter().filter(|c| c.failed).count(),
        containers,
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), LogCollectionError> {
    std::fs::write(path, contents).map_err(|source| LogCollectionError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Write every container's logs and the summary into `dir`
///
/// # Returns
/// The summary, or None when the project had no containers (no summary file
/// is written in that case)
pub async fn collect_container_logs(
    client: &ComposeClient<'_>,
    names: &[String],
    records: &[ContainerRecord],
    dir: &Path,
) -> Result<Option<LogSummary>, LogCollectionError> {
    std::fs::create_dir_all(dir).map_err(|source| LogCollectionError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    if names.is_empty() {
        info!("No containers to collect logs from");
        return Ok(None);
    }

    for name in names {
        let output = client.log_streams(name).await?;
        if !output.stdout.is_empty() {
            write_file(&dir.join(format!("{}.stdout.log", name)), &output.stdout)?;
        }
        if !output.stderr.is_empty() {
            write_file(&dir.join(format!("{}.stderr.log", name)), &output.stderr)?;
        }
        debug!(container = %name, "Collected logs");
    }

    let summary = summarize_containers(names, records, client.project());
    write_file(
        &dir.join(SUMMARY_FILE),
        &serde_json::to_string_pretty(&summary)?,
    )?;

    info!(
        containers = summary.total_containers,
        failed = summary.failed_containers,
        dir = %dir.display(),
        "Container logs collected"
    );
    Ok(Some(summary))
}
