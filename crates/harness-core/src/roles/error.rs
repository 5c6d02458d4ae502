//! Error types for role execution.

use crate::domain::{HarnessError, RoleExecution};

use super::contract::RoleName;

/// A role that failed to produce a valid output.
///
/// Carries the builtin fallback output and the execution metadata recorded
/// before the failure (exit code, stderr tail), so callers can persist both
/// alongside the error.
#[derive(Debug, thiserror::Error)]
#[error("{role} role failed: {source}")]
pub struct RoleFailure<O: std::fmt::Debug> {
    pub role: RoleName,
    pub fallback: O,
    pub execution: RoleExecution,
    #[source]
    pub source: HarnessError,
}

impl<O: std::fmt::Debug> From<RoleFailure<O>> for HarnessError {
    fn from(failure: RoleFailure<O>) -> Self {
        failure.source
    }
}

/// Result type for a single role execution.
pub type RoleResult<T, O> = std::result::Result<T, RoleFailure<O>>;
