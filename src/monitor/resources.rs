//! Resource sampling
//!
//! Parses `docker stats --no-stream` output into one memory/CPU sample per
//! tick and folds samples into a [`ResourceAccumulator`].

use crate::timeline::round1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ResourceParseError {
    #[error("Malformed stats line: {0}")]
    MalformedLine(String),

    #[error("Invalid memory value: {0}")]
    InvalidMemory(String),

    #[error("Invalid CPU value: {0}")]
    InvalidCpu(String),
}

/// Aggregate usage across every container at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceSample {
    pub total_memory_mb: f64,
    pub total_cpu_percent: f64,
    pub containers: usize,
}

/// Peak memory and CPU average persisted with the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub peak_memory_mb: Option<f64>,
    pub avg_cpu_percent: Option<f64>,
}

/// Convert a docker memory quantity (`512.3MiB`, `1.2GB`, `0B`) to MB
///
/// Binary and decimal suffixes are both treated as powers of 1024, matching
/// how the runtime itself reports them.
pub fn parse_memory_mb(value: &str) -> Result<f64, ResourceParseError> {
    let value = value.trim();
    let split = value
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| ResourceParseError::InvalidMemory(value.to_string()))?;
    let (number, unit) = value.split_at(split);

    let number: f64 = number
        .trim()
        .parse()
        .map_err(|_| ResourceParseError::InvalidMemory(value.to_string()))?;

    let factor = match unit {
        "B" => 1.0 / (1024.0 * 1024.0),
        "kB" | "KB" | "KiB" => 1.0 / 1024.0,
        "MB" | "MiB" => 1.0,
        "GB" | "GiB" => 1024.0,
        "TB" | "TiB" => 1024.0 * 1024.0,
        _ => return Err(ResourceParseError::InvalidMemory(value.to_string())),
    };

    Ok(number * factor)
}

/// Parse `12.34%`
pub fn parse_cpu_percent(value: &str) -> Result<f64, ResourceParseError> {
    let trimmed = value.trim();
    trimmed
        .strip_suffix('%')
        .unwrap_or(trimmed)
        .trim()
        .parse()
        .map_err(|_| ResourceParseError::InvalidCpu(value.to_string()))
}

/// Parse one `name\tused / limit\tcpu%` line into `(memory_mb, cpu_percent)`
fn parse_stats_line(line: &str) -> Result<(f64, f64), ResourceParseError> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [_, mem_usage, cpu] = fields.as_slice() else {
        return Err(ResourceParseError::MalformedLine(line.to_string()));
    };

    let used = mem_usage.split('/').next().unwrap_or_default();
    Ok((parse_memory_mb(used)?, parse_cpu_percent(cpu)?))
}

/// Sum a full `docker stats` output into one sample
///
/// Any malformed line fails the whole sample; the caller skips the tick.
pub fn parse_stats_output(output: &str) -> Result<ResourceSample, ResourceParseError> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .try_fold(ResourceSample::default(), |acc, line| {
            let (memory, cpu) = parse_stats_line(line)?;
            Ok(ResourceSample {
                total_memory_mb: acc.total_memory_mb + memory,
                total_cpu_percent: acc.total_cpu_percent + cpu,
                containers: acc.containers + 1,
            })
        })
}

/// Running peak/average over successful samples
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceAccumulator {
    peak_memory_mb: Option<f64>,
    cpu_sum: f64,
    samples: u32,
}

impl ResourceAccumulator {
    /// Fold one sample in; the peak never decreases
    #[must_use]
    pub fn observe(self, sample: ResourceSample) -> Self {
        let peak = match self.peak_memory_mb {
            Some(peak) => peak.max(sample.total_memory_mb),
            None => sample.total_memory_mb,
        };
        Self {
            peak_memory_mb: Some(peak),
            cpu_sum: self.cpu_sum + sample.total_cpu_percent,
            samples: self.samples + 1,
        }
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn peak_memory_mb(&self) -> Option<f64> {
        self.peak_memory_mb
    }

    pub fn avg_cpu_percent(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.cpu_sum / f64::from(self.samples))
    }

    /// Snapshot for the metrics record, rounded to one decimal
    pub fn usage(&self) -> ResourceUsage {
        ResourceUsage {
            peak_memory_mb: self.peak_memory_mb().map(round1),
            avg_cpu_percent: self.avg_cpu_percent().map(round1),
        }
    }
}
