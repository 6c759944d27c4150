//! Run monitoring: status classification, resource sampling, verification
//! parsing and the polling state machine built on top of them.

pub mod phase;
pub mod resources;
pub mod status;
pub mod verification;

pub use phase::{MonitorError, MonitorReport, PhaseMonitor, RunOutcome};
pub use resources::ResourceUsage;
pub use status::{classify_role, ContainerRole, ExpectedTopology};
pub use verification::VerificationStats;
