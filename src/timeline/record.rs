//! Container records from `docker inspect`
//!
//! Only the fields the timeline needs are read. The runtime reports
//! "never" as the zero time `0001-01-01T00:00:00Z`; that sentinel, an empty
//! value, or a container that is still running all mean "not finished".

use crate::monitor::status::{classify_role, ContainerRole};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Prefix of the runtime's zero timestamp
const ZERO_TIME_PREFIX: &str = "0001-01-01";

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("Invalid docker inspect output: {0}")]
    InvalidInspect(#[from] serde_json::Error),

    #[error("Container {container}: malformed {field} timestamp '{value}'")]
    MalformedTimestamp {
        container: String,
        field: &'static str,
        value: String,
    },

    #[error("Container {container}: finished at {finished} before it started at {started}")]
    FinishedBeforeStarted {
        container: String,
        started: DateTime<Utc>,
        finished: DateTime<Utc>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    name: String,
    state: InspectState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    status: String,
    #[serde(default)]
    running: bool,
    #[serde(default)]
    exit_code: i32,
    #[serde(default)]
    started_at: String,
    #[serde(default)]
    finished_at: String,
}

/// One container's lifecycle as captured after the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    /// Raw container name, leading `/` removed
    pub name: String,
    pub role: ContainerRole,
    /// Runtime status string (`exited`, `running`, ...)
    pub exit_status: String,
    pub exit_code: i32,
    pub started_at: DateTime<Utc>,
    /// None while running
    pub finished_at: Option<DateTime<Utc>>,
}

impl ContainerRecord {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// Parse an RFC3339 timestamp, mapping the zero sentinel and empty values to None
fn parse_timestamp(
    container: &str,
    field: &'static str,
    value: &str,
) -> Result<Option<DateTime<Utc>>, TimelineError> {
    let value = value.trim();
    if value.is_empty() || value.starts_with(ZERO_TIME_PREFIX) {
        return Ok(None);
    }

    DateTime::parse_from_rfc3339(value)
        .map(|ts| Some(ts.with_timezone(&Utc)))
        .map_err(|_| TimelineError::MalformedTimestamp {
            container: container.to_string(),
            field,
            value: value.to_string(),
        })
}

/// Parse the JSON array printed by `docker inspect <names...>`
///
/// Roles are classified with the compose `project` prefix stripped.
///
/// # Returns
/// One record per container that actually started. Containers with a zero
/// start time never ran and are left out.
///
/// # Errors
/// Invalid JSON, a malformed timestamp, or a finish time before the start time
pub fn parse_inspect_output(
    json: &str,
    project: &str,
) -> Result<Vec<ContainerRecord>, TimelineError> {
    let entries: Vec<InspectEntry> = serde_json::from_str(json)?;
    let mut records = Vec::with_capacity(entries.len());

    for entry in entries {
        let name = entry.name.trim_start_matches('/').to_string();
        let state = entry.state;

        let Some(started_at) = parse_timestamp(&name, "StartedAt", &state.started_at)? else {
            debug!(container = %name, "Container never started, skipping");
            continue;
        };

        let finished_at = if state.running {
            None
        } else {
            parse_timestamp(&name, "FinishedAt", &state.finished_at)?
        };

        if let Some(finished) = finished_at {
            if finished < started_at {
                return Err(TimelineError::FinishedBeforeStarted {
                    container: name,
                    started: started_at,
                    finished,
                });
            }
        }

        records.push(ContainerRecord {
            role: classify_role(&name, project),
            name,
            exit_status: state.status,
            exit_code: state.exit_code,
            started_at,
            finished_at,
        });
    }

    Ok(records)
}
