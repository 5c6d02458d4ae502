//! Harness domain model.

pub mod error;
pub mod finding;
pub mod run;
pub mod scenario;

pub use error::{ErrorKind, HarnessError, Result};
pub use finding::{codes, finding_codes, Finding};
pub use run::{CommitteeMeta, JudgeScore, RoleExecution, RunResult, SCHEMA_VERSION};
pub use scenario::{Scenario, ScenarioResult, Step, StepResult};
