pub mod metrics;

pub use metrics::{write_prometheus_file, RunMetrics, TelemetryError};
