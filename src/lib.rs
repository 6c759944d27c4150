pub mod compare;
pub mod config;
pub mod monitor;
pub mod oracle;
pub mod record;
pub mod runner;
pub mod telemetry;
pub mod timeline;

// Re-export for the binaries
pub use crate::config::{resolve_from_args, ResolvedConfig, RunArgs};
pub use crate::runner::{CiRunner, RunError, RunReport, ORCHESTRATION_ERROR_EXIT_CODE};
