//! Scenario catalog, concurrent runner and run report.

pub mod catalog;
pub mod report;
pub mod runner;

pub use catalog::{catalog, select, Scenario, ScenarioKind};
pub use report::{OutcomeStatus, ScenarioOutcome, SuiteReport};
pub use runner::SuiteRunner;
