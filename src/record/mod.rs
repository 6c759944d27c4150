//! Run artifacts: the metrics record and collected container logs

pub mod logs;
pub mod metrics;

pub use metrics::{assemble_metrics, MetricsRecord, RecordError, RunIdentity, RunObservations};
