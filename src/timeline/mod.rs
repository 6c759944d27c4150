//! Timeline Builder
//!
//! Turns absolute container timestamps into offsets from the earliest start:
//!
//! ```text
//! started_at ─► start_sec = started_at - baseline
//! finished_at ─► end_sec = finished_at - baseline, duration_sec = end - start
//! (running)   ─► end_sec = None, duration_sec = None
//! ```
//!
//! Phase durations are derived from the timeline only (see [`durations`]).

pub mod durations;
pub mod record;

use crate::monitor::status::{display_name, ContainerRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use durations::{derive_durations, throughput, DurationError, PhaseDurations};
pub use record::{parse_inspect_output, ContainerRecord, TimelineError};

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn offset_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    round1((to - from).num_milliseconds() as f64 / 1000.0)
}

/// One container on the relative time axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Display name (project prefix stripped)
    pub name: String,
    #[serde(rename = "type")]
    pub role: ContainerRole,
    pub start_sec: f64,
    pub end_sec: Option<f64>,
    pub duration_sec: Option<f64>,
    pub exit_code: i32,
}

impl TimelineEntry {
    pub fn is_finished(&self) -> bool {
        self.end_sec.is_some()
    }
}

/// Ordered container timeline, serialised as `{"containers": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub containers: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

/// Build the relative-time timeline
///
/// # Arguments
/// * `records` - Containers that started; order does not matter
/// * `project` - Compose project name stripped from display names
///
/// # Returns
/// Entries sorted by `(start_sec, raw name)`; empty when `records` is empty
pub fn build_timeline(records: &[ContainerRecord], project: &str) -> Timeline {
    let Some(baseline) = records.iter().map(|r| r.started_at).min() else {
        return Timeline::default();
    };

    let mut keyed: Vec<(&str, TimelineEntry)> = records
        .iter()
        .map(|record| {
            let start_sec = offset_secs(baseline, record.started_at);
            let end_sec = record.finished_at.map(|f| offset_secs(baseline, f));
            let entry = TimelineEntry {
                name: display_name(&record.name, project).to_string(),
                role: record.role,
                start_sec,
                end_sec,
                duration_sec: end_sec.map(|end| round1(end - start_sec)),
                exit_code: record.exit_code,
            };
            (record.name.as_str(), entry)
        })
        .collect();

    keyed.sort_by(|(a_name, a), (b_name, b)| {
        a.start_sec
            .total_cmp(&b.start_sec)
            .then_with(|| a_name.cmp(b_name))
    });

    Timeline {
        containers: keyed.into_iter().map(|(_, entry)| entry).collect(),
    }
}
