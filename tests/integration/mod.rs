pub mod framework;

pub use framework::{TestConfig, TestContext, TestResult, TestScenario};
