//! Structured observability hooks for the loop lifecycle.
//!
//! - `loop_span` tagging everything inside a run with its run id
//! - `emit_*` functions for start, iteration, role execution, regression and finish
//!
//! Events are emitted at `info!` level; filter with `RUST_LOG`.

use tracing::{info, warn};

use crate::domain::{JudgeScore, RoleExecution};
use crate::roles::RoleName;

/// Span tagging everything inside one loop run with its run id.
///
/// Attach with `tracing::Instrument::instrument` so the span follows the
/// future across await points.
pub fn loop_span(run_id: &str, mode: &str) -> tracing::Span {
    tracing::info_span!("harness.loop", run_id = %run_id, mode = %mode)
}

pub fn emit_loop_started(run_id: &str, mode: &str, max_iterations: u32, threshold: f64) {
    info!(
        event = "loop.started",
        run_id = %run_id,
        mode = %mode,
        max_iterations = max_iterations,
        threshold = threshold,
    );
}

/// Emit event: one iteration scored.
pub fn emit_iteration(run_id: &str, iteration: u32, judge: &JudgeScore, fixes: usize) {
    info!(
        event = "loop.iteration",
        run_id = %run_id,
        iteration = iteration,
        score = judge.score,
        pass = judge.pass,
        hard_failures = judge.hard_failures,
        fixes = fixes,
    );
}

pub fn emit_role_executed(role: RoleName, execution: &RoleExecution) {
    info!(
        event = "role.executed",
        role = %role,
        strategy = %execution.strategy,
        exit_code = execution.exit_code,
    );
}

pub fn emit_role_failed(role: RoleName, error: &dyn std::fmt::Display) {
    warn!(event = "role.failed", role = %role, error = %error);
}

pub fn emit_loop_finished(run_id: &str, iterations: u32, score: f64, pass: bool) {
    info!(
        event = "loop.finished",
        run_id = %run_id,
        iterations = iterations,
        score = score,
        pass = pass,
    );
}

/// Emit event: regression check completed.
pub fn emit_regression_checked(profile: &str, pass: bool, drift_count: usize) {
    info!(
        event = "regression.checked",
        profile = %profile,
        pass = pass,
        drift_count = drift_count,
    );
}

/// Emit event: a non-fatal write failure (reports, logs, optional artifacts).
pub fn emit_artifact_write_error(path: &std::path::Path, error: &dyn std::fmt::Display) {
    warn!(event = "artifact.write_error", path = %path.display(), error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_span_create() {
        let _entered = loop_span("20260101-000000", "committee").entered();
        emit_loop_started("20260101-000000", "committee", 3, 9.0);
    }
}
