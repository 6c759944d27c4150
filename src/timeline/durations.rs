//! Duration Deriver
//!
//! Phase durations come from the timeline alone. The orchestrator's own
//! clock is never used and missing data is never estimated.

use super::{round1, TimelineEntry};
use crate::monitor::status::ContainerRole;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("No sync containers in timeline")]
    NoSyncContainers,

    #[error("Sync containers still running: {}", .0.join(", "))]
    SyncIncomplete(Vec<String>),
}

/// Phase durations in seconds, one decimal
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub total: f64,
    pub populate: f64,
    pub sync: f64,
    pub verify: f64,
}

fn finished_of(
    entries: &[TimelineEntry],
    role: ContainerRole,
) -> impl Iterator<Item = &TimelineEntry> + Clone + '_ {
    entries
        .iter()
        .filter(move |e| e.role == role && e.is_finished())
}

fn max_end<'a>(entries: impl Iterator<Item = &'a TimelineEntry>) -> Option<f64> {
    entries.filter_map(|e| e.end_sec).reduce(f64::max)
}

/// `max(end) - min(start)` over finished entries, 0 when there are none
fn span<'a>(entries: impl Iterator<Item = &'a TimelineEntry> + Clone) -> f64 {
    let start = entries.clone().map(|e| e.start_sec).reduce(f64::min);
    match (start, max_end(entries)) {
        (Some(start), Some(end)) => end - start,
        _ => 0.0,
    }
}

/// Derive phase durations
///
/// # Errors
/// * `NoSyncContainers` - The timeline has no sync entry
/// * `SyncIncomplete` - At least one sync entry is still running
pub fn derive_durations(entries: &[TimelineEntry]) -> Result<PhaseDurations, DurationError> {
    let sync: Vec<&TimelineEntry> = entries
        .iter()
        .filter(|e| e.role == ContainerRole::Sync)
        .collect();

    if sync.is_empty() {
        return Err(DurationError::NoSyncContainers);
    }

    let running: Vec<String> = sync
        .iter()
        .filter(|e| !e.is_finished())
        .map(|e| e.name.clone())
        .collect();
    if !running.is_empty() {
        return Err(DurationError::SyncIncomplete(running));
    }

    Ok(PhaseDurations {
        total: round1(max_end(entries.iter()).unwrap_or(0.0)),
        populate: round1(max_end(finished_of(entries, ContainerRole::Populate)).unwrap_or(0.0)),
        sync: round1(span(sync.iter().copied())),
        verify: round1(span(finished_of(entries, ContainerRole::Verify))),
    })
}

/// Rows per second over the sync phase
///
/// Falls back to the total duration when sync took no measurable time, and
/// yields 0 when both are zero.
pub fn throughput(rows_per_table: u64, table_count: usize, durations: &PhaseDurations) -> f64 {
    let effective = if durations.sync > 0.0 {
        durations.sync
    } else {
        durations.total
    };

    if effective <= 0.0 {
        return 0.0;
    }

    let total_rows = rows_per_table as f64 * table_count as f64;
    round1(total_rows / effective)
}
