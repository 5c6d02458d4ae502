//! Committee orchestrator: planner, fixer and an independent judger per
//! iteration.
//!
//! Each iteration observes the scenario, plans, fixes, observes again and
//! has the judger review the post-fix state. The loop stops as soon as the
//! run passes, auto-fix is off, or an iteration applied no fixes.

use chrono::Utc;
use tracing::instrument;

use crate::artifacts::{final_report_path, iteration_dir, run_dir};
use crate::domain::{
    CommitteeMeta, Finding, HarnessError, Result, RoleExecution, RunResult, SCHEMA_VERSION,
};
use crate::git::current_branch;
use crate::judge::judge;
use crate::obs;
use crate::roles::{
    run_fixer, run_judger, run_planner, CommitteeRoles, JudgerOutput, PlannerOutput, RoleContext,
    RoleFailure, RoleInvocation, RoleName, RoleOutput,
};
use crate::session::LoopSession;

/// Run the committee loop and persist `final-report.json`.
#[instrument(skip_all, fields(run_id = %session.run_id))]
pub async fn run_committee(session: &LoopSession, roles: &CommitteeRoles) -> Result<RunResult> {
    let config = &session.config;
    let repo_root = session.repo_root();
    let base_dir = run_dir(repo_root, &session.run_id);
    std::fs::create_dir_all(&base_dir)?;

    let mut meta = CommitteeMeta {
        planner: RoleExecution {
            strategy: roles.planner.label().to_string(),
            ..Default::default()
        },
        fixer: RoleExecution {
            strategy: roles.fixer.label().to_string(),
            ..Default::default()
        },
        judger: RoleExecution {
            strategy: roles.judger.label().to_string(),
            independent: true,
            ..Default::default()
        },
    };
    let mut result = RunResult {
        schema_version: SCHEMA_VERSION.to_string(),
        started_at: session.started_at,
        finished_at: session.started_at,
        branch: current_branch(repo_root),
        mode: config.mode.to_string(),
        run_id: session.run_id.clone(),
        ..Default::default()
    };

    for iteration in 1..=config.max_iterations {
        let artifact_dir = iteration_dir(&base_dir, iteration);
        std::fs::create_dir_all(&artifact_dir)?;
        let inv = RoleInvocation {
            repo_root,
            artifact_dir: &artifact_dir,
            timeout: config.limits.role_timeout,
            verbose_artifacts: config.verbose_artifacts,
        };

        let (scenario, findings) = session.observe().await?;
        let ctx = RoleContext {
            run_id: session.run_id.clone(),
            mode: config.mode.to_string(),
            iteration,
            threshold: config.threshold,
            budget: config.budget,
            seed: config.seed,
            scenario,
            findings,
            fixes_so_far: result.fixes_applied.clone(),
            repo_root: repo_root.to_path_buf(),
            artifact_dir: artifact_dir.clone(),
        };

        let plan = match run_planner(&roles.planner, &inv, &ctx).await {
            Ok(plan) => plan,
            Err(failure) => {
                return Err(record_role_failure(session, iteration, result, meta, failure))
            }
        };
        meta.planner = plan.execution;

        let fixer_run = run_fixer(&roles.fixer, &inv, &ctx, &plan.output, &session.fixer);
        let fixed = match fixer_run.await {
            Ok(fixed) => fixed,
            Err(failure) => {
                return Err(record_role_failure(session, iteration, result, meta, failure))
            }
        };
        meta.fixer = fixed.outcome.execution;
        result.fixes_applied.extend(fixed.fixes.iter().cloned());

        let (post_scenario, post_findings) = session.observe().await?;
        let judge_ctx = RoleContext {
            scenario: post_scenario.clone(),
            findings: post_findings.clone(),
            ..ctx.clone()
        };
        let verdict = match run_judger(&roles.judger, &inv, &judge_ctx).await {
            Ok(verdict) => verdict,
            Err(failure) => {
                return Err(record_role_failure(session, iteration, result, meta, failure))
            }
        };
        meta.judger = verdict.execution;

        let mut all_findings = post_findings;
        all_findings.extend(verdict.output.extra_findings.iter().cloned());

        let mut score = judge(&post_scenario, &all_findings, config.threshold);
        score.planner_score = score_planner(&plan.output, &ctx.findings);
        score.fixer_score = score_fixer(&ctx.findings, &all_findings, &fixed.fixes);
        score.judger_score = score_judger(&verdict.output);

        obs::emit_iteration(&session.run_id, iteration, &score, fixed.fixes.len());
        let stop = score.pass || !config.auto_fix || fixed.fixes.is_empty();

        result.scenario = post_scenario;
        result.findings = all_findings;
        result.judge = score;
        result.iterations = iteration;
        result.finished_at = Utc::now();

        if stop {
            break;
        }
    }

    if result.iterations == 0 {
        result.iterations = 1;
        result.finished_at = Utc::now();
    }
    result.committee = Some(meta);

    session.write_final_report(&result)?;
    Ok(result)
}

/// Persist a partial `final-report.json` holding the failed role's execution
/// and return the underlying error. Fixes the fallback already applied stay
/// on record.
fn record_role_failure<O: RoleOutput>(
    session: &LoopSession,
    iteration: u32,
    mut result: RunResult,
    mut meta: CommitteeMeta,
    failure: RoleFailure<O>,
) -> HarnessError {
    let RoleFailure {
        role,
        fallback,
        execution,
        source,
    } = failure;
    let slot = match role {
        RoleName::Planner => &mut meta.planner,
        RoleName::Fixer => &mut meta.fixer,
        RoleName::Judger => &mut meta.judger,
    };
    *slot = execution;
    result.fixes_applied.extend(fallback.applied().iter().cloned());
    result.committee = Some(meta);
    result.iterations = iteration;
    result.finished_at = Utc::now();
    if let Err(e) = session.write_final_report(&result) {
        obs::emit_artifact_write_error(&final_report_path(session.repo_root(), &session.run_id), &e);
    }
    source
}

// ---------------------------------------------------------------------------
// Role sub-scores (each within [1, 5])
// ---------------------------------------------------------------------------

/// Share of pre-fix findings the plan targeted.
pub fn score_planner(plan: &PlannerOutput, findings: &[Finding]) -> f64 {
    if findings.is_empty() {
        return 5.0;
    }
    if plan.fix_targets.is_empty() {
        return 1.0;
    }
    let matched = findings
        .iter()
        .filter(|f| plan.fix_targets.iter().any(|t| t.trim() == f.code))
        .count();
    1.0 + 4.0 * matched as f64 / findings.len() as f64
}

/// Share of pre-fix findings the fixes removed.
pub fn score_fixer(before: &[Finding], after: &[Finding], fixes: &[String]) -> f64 {
    if before.is_empty() {
        return 5.0;
    }
    if fixes.is_empty() || after.len() > before.len() {
        return 1.0;
    }
    let reduction = before.len() - after.len();
    1.0 + 4.0 * reduction as f64 / before.len() as f64
}

pub fn score_judger(verdict: &JudgerOutput) -> f64 {
    if verdict.notes.trim().is_empty() {
        2.0
    } else {
        5.0
    }
}
