//! Prometheus export of a finished run
//!
//! Renders one [`MetricsRecord`] as text exposition for a node-exporter
//! textfile collector:
//! - Phase durations and throughput
//! - Verification row counts
//! - Peak memory and CPU average
//! - Outcome and poll ticks

use crate::monitor::RunOutcome;
use crate::record::MetricsRecord;
use prometheus::{self, Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::path::{Path, PathBuf};
use thiserror::Error;

const ALL_OUTCOMES: [RunOutcome; 4] = [
    RunOutcome::Success,
    RunOutcome::Timeout,
    RunOutcome::InfraFailure,
    RunOutcome::VerifyFailure,
];

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Run metrics registry
#[derive(Clone)]
pub struct RunMetrics {
    registry: Registry,
    /// Phase durations in seconds (total, populate, sync, verify)
    pub phase_duration_seconds: GaugeVec,
    pub throughput_rows_per_second: GaugeVec,
    /// Verified rows by result (matched, missing, mismatched)
    pub verification_rows: IntGaugeVec,
    pub peak_memory_megabytes: GaugeVec,
    pub avg_cpu_percent: GaugeVec,
    /// 1 for the run's outcome, 0 for the others
    pub run_outcome: IntGaugeVec,
    pub poll_ticks_total: IntCounterVec,
}

impl RunMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let phase_duration_seconds = GaugeVec::new(
            Opts::new(
                "loadtest_phase_duration_seconds",
                "Duration of each load test phase in seconds",
            ),
            &["source", "phase"],
        )?;
        registry.register(Box::new(phase_duration_seconds.clone()))?;

        let throughput_rows_per_second = GaugeVec::new(
            Opts::new(
                "loadtest_throughput_rows_per_second",
                "Rows synced per second during the sync phase",
            ),
            &["source"],
        )?;
        registry.register(Box::new(throughput_rows_per_second.clone()))?;

        let verification_rows = IntGaugeVec::new(
            Opts::new(
                "loadtest_verification_rows",
                "Rows checked by verify containers by result",
            ),
            &["source", "result"],
        )?;
        registry.register(Box::new(verification_rows.clone()))?;

        let peak_memory_megabytes = GaugeVec::new(
            Opts::new(
                "loadtest_peak_memory_megabytes",
                "Peak memory summed across containers",
            ),
            &["source"],
        )?;
        registry.register(Box::new(peak_memory_megabytes.clone()))?;

        let avg_cpu_percent = GaugeVec::new(
            Opts::new(
                "loadtest_avg_cpu_percent",
                "Average CPU summed across containers",
            ),
            &["source"],
        )?;
        registry.register(Box::new(avg_cpu_percent.clone()))?;

        let run_outcome = IntGaugeVec::new(
            Opts::new("loadtest_run_outcome", "Outcome of the load test run"),
            &["source", "status"],
        )?;
        registry.register(Box::new(run_outcome.clone()))?;

        let poll_ticks_total = IntCounterVec::new(
            Opts::new(
                "loadtest_poll_ticks_total",
                "Status polls performed before the run reached a terminal state",
            ),
            &["source"],
        )?;
        registry.register(Box::new(poll_ticks_total.clone()))?;

        Ok(Self {
            registry,
            phase_duration_seconds,
            throughput_rows_per_second,
            verification_rows,
            peak_memory_megabytes,
            avg_cpu_percent,
            run_outcome,
            poll_ticks_total,
        })
    }

    /// Set every metric from a finished run
    ///
    /// Absent values (durations of a failed run, resources without samples)
    /// are left out rather than exported as zero.
    pub fn observe_record(&self, record: &MetricsRecord, ticks: u32) {
        let source = record.source.as_str();
        let results = &record.results;

        let phases = [
            ("total", results.total_duration_seconds),
            ("populate", results.populate_duration_seconds),
            ("sync", results.sync_duration_seconds),
            ("verify", results.verify_duration_seconds),
        ];
        for (phase, value) in phases {
            if let Some(value) = value {
                self.phase_duration_seconds
                    .with_label_values(&[source, phase])
                    .set(value);
            }
        }

        if let Some(throughput) = results.throughput_rows_per_sec {
            self.throughput_rows_per_second
                .with_label_values(&[source])
                .set(throughput);
        }

        let verification = record.verification;
        for (result, rows) in [
            ("matched", verification.matched),
            ("missing", verification.missing),
            ("mismatched", verification.mismatched),
        ] {
            self.verification_rows
                .with_label_values(&[source, result])
                .set(i64::try_from(rows).unwrap_or(i64::MAX));
        }

        if let Some(peak) = record.resources.peak_memory_mb {
            self.peak_memory_megabytes
                .with_label_values(&[source])
                .set(peak);
        }
        if let Some(cpu) = record.resources.avg_cpu_percent {
            self.avg_cpu_percent.with_label_values(&[source]).set(cpu);
        }

        for outcome in ALL_OUTCOMES {
            self.run_outcome
                .with_label_values(&[source, outcome.as_str()])
                .set(i64::from(outcome == results.status));
        }

        self.poll_ticks_total
            .with_label_values(&[source])
            .inc_by(u64::from(ticks));
    }

    /// Encode all metrics to Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
        })
    }
}

/// Render `record` and write it to `path`
pub fn write_prometheus_file(
    record: &MetricsRecord,
    ticks: u32,
    path: &Path,
) -> Result<(), TelemetryError> {
    let metrics = RunMetrics::new()?;
    metrics.observe_record(record, ticks);
    let text = metrics.encode()?;
    std::fs::write(path, text).map_err(|source| TelemetryError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[path = "metrics_test.rs"]
mod tests;
