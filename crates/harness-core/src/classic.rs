//! Classic orchestrator: observe, judge and apply builtin fixes, keeping the
//! best-scoring attempt.

use chrono::Utc;
use tracing::instrument;

use crate::domain::{Result, RunResult, SCHEMA_VERSION};
use crate::git::current_branch;
use crate::judge::judge;
use crate::obs;
use crate::session::LoopSession;

/// Run the classic loop and persist `final-report.json`.
///
/// The result is the highest-scoring attempt (earliest wins ties) carrying
/// every fix applied during the run and the number of iterations executed.
#[instrument(skip_all, fields(run_id = %session.run_id))]
pub async fn run_classic(session: &LoopSession) -> Result<RunResult> {
    let config = &session.config;
    let repo_root = session.repo_root();
    let branch = current_branch(repo_root);

    let mut best: Option<RunResult> = None;
    let mut fixes_applied: Vec<String> = Vec::new();
    let mut executed = 0;

    for iteration in 1..=config.max_iterations {
        executed = iteration;
        let (scenario, findings) = session.observe().await?;
        let score = judge(&scenario, &findings, config.threshold);
        let pass = score.pass;

        let attempt = RunResult {
            schema_version: SCHEMA_VERSION.to_string(),
            started_at: session.started_at,
            finished_at: Utc::now(),
            scenario,
            findings,
            judge: score,
            iterations: iteration,
            branch: branch.clone(),
            mode: config.mode.to_string(),
            run_id: session.run_id.clone(),
            ..Default::default()
        };
        obs::emit_iteration(&session.run_id, iteration, &attempt.judge, 0);

        if !config.auto_fix || pass {
            keep_best(&mut best, attempt);
            break;
        }

        let applied = session.fixer.apply(repo_root, &attempt.findings).await?;
        keep_best(&mut best, attempt);
        if applied.is_empty() {
            break;
        }
        fixes_applied.extend(applied);
    }

    let mut result = best.unwrap_or_else(|| RunResult {
        schema_version: SCHEMA_VERSION.to_string(),
        started_at: session.started_at,
        branch,
        mode: config.mode.to_string(),
        run_id: session.run_id.clone(),
        ..Default::default()
    });
    result.fixes_applied = fixes_applied;
    result.iterations = executed.max(1);
    result.finished_at = Utc::now();

    session.write_final_report(&result)?;
    Ok(result)
}

fn keep_best(best: &mut Option<RunResult>, attempt: RunResult) {
    let better = best
        .as_ref()
        .map_or(true, |current| attempt.judge.score > current.judge.score);
    if better {
        *best = Some(attempt);
    }
}
