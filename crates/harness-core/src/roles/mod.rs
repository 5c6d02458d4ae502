//! Committee roles (planner / fixer / judger), builtin or external.
//!
//! # Module layout
//!
//! - [`contract`]: `RoleName`, `RoleStrategy`, `RoleOutput`, role payloads, `RoleContext`
//! - [`error`]: `RoleFailure`, `RoleResult`
//! - [`executor`]: `run_planner`, `run_fixer`, `run_judger`, the external protocol

pub mod contract;
pub mod error;
pub mod executor;

pub use contract::{
    CommitteeRoles, FixerInput, FixerOutput, JudgerOutput, PlannerOutput, RoleContext, RoleName,
    RoleOutput, RoleStrategy, BUILTIN_LABEL, EXTERNAL_LABEL,
};
pub use error::{RoleFailure, RoleResult};
pub use executor::{run_fixer, run_judger, run_planner, FixerOutcome, RoleInvocation, RoleOutcome};
