//! Role execution: builtin roles return their fallback, external roles run a
//! shell command and exchange JSON through files.
//!
//! External protocol, per role and iteration:
//!
//! | file / variable | content |
//! |---|---|
//! | `HARNESS_CONTEXT_FILE` = `<role>-context.json` | role input |
//! | `HARNESS_OUTPUT_FILE` = `<role>-external-output.json` | preferred output channel |
//! | stdout | output when the output file is absent or blank |
//! | `<role>-stdout.log`, `<role>-stderr.log` | full streams |
//! | `<role>-output.json` | validated output |
//!
//! `HARNESS_ROLE` and `HARNESS_REPO_ROOT` are also set; the command runs in
//! the repo root.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::instrument;

use crate::artifacts::write_json;
use crate::domain::{HarnessError, Result, RoleExecution};
use crate::fixer::Fixer;
use crate::obs;
use crate::process::{run_shell, tail_chars, TAIL_CHARS};

use super::contract::{
    FixerInput, FixerOutput, JudgerOutput, PlannerOutput, RoleContext, RoleName, RoleOutput,
    RoleStrategy,
};
use super::error::{RoleFailure, RoleResult};

/// Where and how a role runs for one iteration.
#[derive(Debug, Clone, Copy)]
pub struct RoleInvocation<'a> {
    pub repo_root: &'a Path,
    pub artifact_dir: &'a Path,
    pub timeout: Option<Duration>,
    /// Persist builtin role contexts too, making every iteration replayable.
    pub verbose_artifacts: bool,
}

/// A validated role output with its execution metadata.
#[derive(Debug, Clone)]
pub struct RoleOutcome<O> {
    pub output: O,
    pub execution: RoleExecution,
}

/// Fixer outcome: every fix applied this iteration, builtin first.
#[derive(Debug, Clone)]
pub struct FixerOutcome {
    pub fixes: Vec<String>,
    pub outcome: RoleOutcome<FixerOutput>,
}

impl RoleStrategy {
    fn base_execution(&self, role: RoleName, inv: &RoleInvocation<'_>) -> RoleExecution {
        RoleExecution {
            strategy: self.label().to_string(),
            independent: role == RoleName::Judger,
            command: self.command().to_string(),
            artifacts: inv.artifact_dir.display().to_string(),
            ..Default::default()
        }
    }

    /// Run this strategy for role `O::ROLE`.
    ///
    /// Builtin returns `fallback`. External returns the decoded, normalized and
    /// validated payload. Any failure hands back `fallback` and the execution
    /// recorded so far inside the error.
    pub async fn execute<I, O>(
        &self,
        inv: &RoleInvocation<'_>,
        input: &I,
        fallback: O,
    ) -> RoleResult<RoleOutcome<O>, O>
    where
        I: Serialize + Sync,
        O: RoleOutput,
    {
        let role = O::ROLE;
        let mut execution = self.base_execution(role, inv);

        let produced = match self {
            RoleStrategy::Builtin { .. } => {
                if inv.verbose_artifacts {
                    write_optional(&inv.artifact_dir.join(role.artifact_file("context.json")), input);
                }
                fallback.validate().map(|_| fallback.clone())
            }
            RoleStrategy::External { command, .. } => {
                run_external::<I, O>(role, command, inv, input, &mut execution)
                    .await
                    .and_then(|mut output| {
                        output.normalize();
                        output.validate()?;
                        Ok(output)
                    })
            }
        };

        match produced {
            Ok(output) => {
                write_optional(&inv.artifact_dir.join(role.artifact_file("output.json")), &output);
                obs::emit_role_executed(role, &execution);
                Ok(RoleOutcome { output, execution })
            }
            Err(source) => {
                obs::emit_role_failed(role, &source);
                Err(RoleFailure {
                    role,
                    fallback,
                    execution,
                    source,
                })
            }
        }
    }
}

/// Planner: builtin plan targets every finding code.
#[instrument(skip_all, fields(role = "planner", iteration = ctx.iteration))]
pub async fn run_planner(
    strategy: &RoleStrategy,
    inv: &RoleInvocation<'_>,
    ctx: &RoleContext,
) -> RoleResult<RoleOutcome<PlannerOutput>, PlannerOutput> {
    strategy
        .execute(inv, ctx, PlannerOutput::builtin(&ctx.findings))
        .await
}

/// Fixer: builtin fixes always run first; an external fixer's `applied`
/// entries are appended to them.
#[instrument(skip_all, fields(role = "fixer", iteration = ctx.iteration))]
pub async fn run_fixer(
    strategy: &RoleStrategy,
    inv: &RoleInvocation<'_>,
    ctx: &RoleContext,
    plan: &PlannerOutput,
    fixer: &Fixer,
) -> RoleResult<FixerOutcome, FixerOutput> {
    let builtin_fixes = match fixer.apply(inv.repo_root, &ctx.findings).await {
        Ok(applied) => applied,
        Err(source) => {
            obs::emit_role_failed(RoleName::Fixer, &source);
            return Err(RoleFailure {
                role: RoleName::Fixer,
                fallback: FixerOutput::builtin(Vec::new()),
                execution: strategy.base_execution(RoleName::Fixer, inv),
                source,
            });
        }
    };

    let input = FixerInput {
        context: ctx.clone(),
        plan: plan.clone(),
    };
    let mut outcome = strategy
        .execute(inv, &input, FixerOutput::builtin(builtin_fixes.clone()))
        .await?;
    outcome.execution.applied = outcome.output.applied.clone();
    outcome.execution.notes = outcome.output.notes.clone();

    let fixes = match strategy {
        RoleStrategy::Builtin { .. } => builtin_fixes,
        RoleStrategy::External { .. } => {
            let mut fixes = builtin_fixes;
            fixes.extend(outcome.output.applied.iter().cloned());
            fixes
        }
    };
    Ok(FixerOutcome { fixes, outcome })
}

/// Judger: independent review of the post-fix scenario.
#[instrument(skip_all, fields(role = "judger", iteration = ctx.iteration))]
pub async fn run_judger(
    strategy: &RoleStrategy,
    inv: &RoleInvocation<'_>,
    ctx: &RoleContext,
) -> RoleResult<RoleOutcome<JudgerOutput>, JudgerOutput> {
    let mut outcome = strategy.execute(inv, ctx, JudgerOutput::builtin()).await?;
    outcome.execution.notes = outcome.output.notes.clone();
    Ok(outcome)
}

async fn run_external<I, O>(
    role: RoleName,
    command: &str,
    inv: &RoleInvocation<'_>,
    input: &I,
    execution: &mut RoleExecution,
) -> Result<O>
where
    I: Serialize + Sync,
    O: RoleOutput,
{
    let context_path = inv.artifact_dir.join(role.artifact_file("context.json"));
    let output_path = inv.artifact_dir.join(role.artifact_file("external-output.json"));
    write_json(&context_path, input)?;

    let envs = [
        ("HARNESS_ROLE", role.to_string()),
        ("HARNESS_CONTEXT_FILE", context_path.display().to_string()),
        ("HARNESS_OUTPUT_FILE", output_path.display().to_string()),
        ("HARNESS_REPO_ROOT", inv.repo_root.display().to_string()),
    ];
    let out = run_shell(command, inv.repo_root, &envs, inv.timeout).await?;

    execution.exit_code = out.exit_code;
    execution.stderr_tail = tail_chars(&out.stderr, TAIL_CHARS).to_string();
    write_log(&inv.artifact_dir.join(role.artifact_file("stdout.log")), &out.stdout);
    write_log(&inv.artifact_dir.join(role.artifact_file("stderr.log")), &out.stderr);

    if out.timed_out {
        return Err(HarnessError::Timeout {
            what: format!("external role {role}"),
            limit_ms: inv.timeout.map(|t| t.as_millis() as u64).unwrap_or_default(),
        });
    }
    if !out.success() {
        let diagnostic = execution.stderr_tail.trim();
        let reason = if diagnostic.is_empty() {
            format!("exit code {}", out.exit_code)
        } else {
            format!("exit code {}: {diagnostic}", out.exit_code)
        };
        return Err(HarnessError::RoleFailed {
            role: role.to_string(),
            reason,
        });
    }

    let from_file = std::fs::read_to_string(&output_path).unwrap_or_default();
    let payload = if from_file.trim().is_empty() {
        out.stdout.trim()
    } else {
        from_file.trim()
    };
    if payload.is_empty() {
        return Err(HarnessError::ContractValidation(format!(
            "external role {role} produced no output"
        )));
    }
    serde_json::from_str(payload).map_err(|e| {
        HarnessError::ContractValidation(format!("parse external role {role} output: {e}"))
    })
}

fn write_optional<T: Serialize + ?Sized>(path: &Path, value: &T) {
    if let Err(e) = write_json(path, value) {
        obs::emit_artifact_write_error(path, &e);
    }
}

fn write_log(path: &Path, body: &str) {
    if let Err(e) = std::fs::write(path, body) {
        obs::emit_artifact_write_error(path, &e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, Finding};

    fn ctx(artifact_dir: &Path) -> RoleContext {
        RoleContext {
            run_id: "r1".to_string(),
            mode: "committee".to_string(),
            iteration: 1,
            threshold: 9.0,
            budget: 1,
            findings: vec![Finding::new("step_failed", "high", "boom", "verify")],
            artifact_dir: artifact_dir.to_path_buf(),
            ..Default::default()
        }
    }

    fn external(command: &str) -> RoleStrategy {
        RoleStrategy::external(command)
    }

    fn invocation<'a>(dir: &'a Path) -> RoleInvocation<'a> {
        RoleInvocation {
            repo_root: dir,
            artifact_dir: dir,
            timeout: None,
            verbose_artifacts: false,
        }
    }

    #[tokio::test]
    async fn test_builtin_planner_targets_findings() {
        let dir = tempfile::tempdir().unwrap();
        let inv = invocation(dir.path());
        let out = run_planner(&RoleStrategy::builtin(), &inv, &ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(out.output.summary, "builtin planner");
        assert_eq!(out.output.fix_targets, vec!["step_failed".to_string()]);
        assert_eq!(out.execution.strategy, "builtin");
        assert!(dir.path().join("planner-output.json").exists());
        assert!(!dir.path().join("planner-context.json").exists());
    }

    #[tokio::test]
    async fn test_builtin_verbose_persists_context() {
        let dir = tempfile::tempdir().unwrap();
        let inv = RoleInvocation {
            verbose_artifacts: true,
            ..invocation(dir.path())
        };
        run_planner(&RoleStrategy::builtin(), &inv, &ctx(dir.path()))
            .await
            .unwrap();
        let saved: RoleContext =
            crate::artifacts::read_json(&dir.path().join("planner-context.json")).unwrap();
        assert_eq!(saved.run_id, "r1");
    }

    #[tokio::test]
    async fn test_external_planner_reads_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let inv = invocation(dir.path());
        let out = run_planner(
            &external(r#"echo '{"summary":"external plan","fix_targets":["step_failed"]}'"#),
            &inv,
            &ctx(dir.path()),
        )
        .await
        .unwrap();
        assert_eq!(out.output.summary, "external plan");
        assert_eq!(out.output.schema_version, "v1");
        assert_eq!(out.execution.strategy, "external");
        assert!(dir.path().join("planner-context.json").exists());
        assert!(dir.path().join("planner-stdout.log").exists());
        assert!(dir.path().join("planner-stderr.log").exists());
    }

    #[tokio::test]
    async fn test_output_file_wins_over_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let inv = invocation(dir.path());
        let command = r#"echo '{"notes":"from file"}' > "$HARNESS_OUTPUT_FILE"; echo '{"notes":"from stdout"}'"#;
        let out = run_judger(&external(command), &inv, &ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(out.output.notes, "from file");
        assert!(out.execution.independent);
        assert_eq!(out.execution.notes, "from file");
    }

    #[tokio::test]
    async fn test_external_role_sees_protocol_env() {
        let dir = tempfile::tempdir().unwrap();
        let inv = invocation(dir.path());
        let command = r#"test "$HARNESS_ROLE" = judger && test -s "$HARNESS_CONTEXT_FILE" && test -n "$HARNESS_REPO_ROOT" && echo '{"notes":"env ok"}'"#;
        let out = run_judger(&external(command), &inv, &ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(out.output.notes, "env ok");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_role_failure_with_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let inv = invocation(dir.path());
        let failure = run_planner(&external("echo broken 1>&2; exit 7"), &inv, &ctx(dir.path()))
            .await
            .unwrap_err();
        assert_eq!(failure.role, RoleName::Planner);
        assert_eq!(failure.fallback.summary, "builtin planner");
        assert_eq!(failure.execution.exit_code, 7);
        assert_eq!(failure.execution.stderr_tail, "broken\n");
        assert_eq!(failure.source.kind(), ErrorKind::Execution);
        assert_eq!(
            failure.source.to_string(),
            "external role planner failed: exit code 7: broken"
        );
    }

    #[tokio::test]
    async fn test_silent_nonzero_exit_reports_exit_code_only() {
        let dir = tempfile::tempdir().unwrap();
        let inv = invocation(dir.path());
        let failure = run_judger(&external("exit 3"), &inv, &ctx(dir.path()))
            .await
            .unwrap_err();
        assert_eq!(failure.source.to_string(), "external role judger failed: exit code 3");
        assert!(failure.execution.independent);
    }

    #[tokio::test]
    async fn test_labelled_builtin_with_command_runs_externally() {
        let dir = tempfile::tempdir().unwrap();
        let inv = invocation(dir.path());
        let spec = crate::config::RoleSpec {
            strategy: "builtin".to_string(),
            command: r#"echo '{"notes":"ran the command"}'"#.to_string(),
        };
        let out = run_judger(&RoleStrategy::resolve(&spec), &inv, &ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(out.output.notes, "ran the command");
        assert_eq!(out.execution.strategy, "builtin");
        assert!(dir.path().join("judger-stdout.log").exists());
    }

    #[tokio::test]
    async fn test_empty_output_is_contract_violation() {
        let dir = tempfile::tempdir().unwrap();
        let inv = invocation(dir.path());
        let failure = run_judger(&external("true"), &inv, &ctx(dir.path()))
            .await
            .unwrap_err();
        assert_eq!(failure.source.kind(), ErrorKind::ContractValidation);
        assert!(failure.source.to_string().contains("produced no output"));
    }

    #[tokio::test]
    async fn test_missing_summary_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let inv = invocation(dir.path());
        let failure = run_planner(
            &external(r#"echo '{"fix_targets":[]}'"#),
            &inv,
            &ctx(dir.path()),
        )
        .await
        .unwrap_err();
        assert!(failure.source.to_string().contains("planner summary is required"));
        assert!(!dir.path().join("planner-output.json").exists());
    }

    #[tokio::test]
    async fn test_role_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let inv = RoleInvocation {
            timeout: Some(Duration::from_millis(100)),
            ..invocation(dir.path())
        };
        let failure = run_judger(&external("sleep 5"), &inv, &ctx(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(failure.source, HarnessError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_external_fixer_appends_after_builtin_fixes() {
        let dir = tempfile::tempdir().unwrap();
        let inv = invocation(dir.path());
        let mut context = ctx(dir.path());
        context.findings = vec![Finding::new("counter_intuitive_abort", "medium", "m", "verify")];
        let command = r#"grep -q '"plan"' "$HARNESS_CONTEXT_FILE" && echo '{"applied":["rewrote docs"],"notes":"external fixer"}'"#;
        let out = run_fixer(
            &external(command),
            &inv,
            &context,
            &PlannerOutput::builtin(&context.findings),
            &Fixer::default(),
        )
        .await
        .unwrap();
        assert_eq!(
            out.fixes,
            vec![
                "recorded counter-intuitive issue".to_string(),
                "rewrote docs".to_string()
            ]
        );
        assert_eq!(out.outcome.execution.applied, vec!["rewrote docs".to_string()]);
        assert_eq!(out.outcome.execution.notes, "external fixer");
    }

    #[tokio::test]
    async fn test_builtin_fixer_reports_builtin_fixes() {
        let dir = tempfile::tempdir().unwrap();
        let inv = invocation(dir.path());
        let out = run_fixer(
            &RoleStrategy::builtin(),
            &inv,
            &ctx(dir.path()),
            &PlannerOutput::default(),
            &Fixer::default(),
        )
        .await
        .unwrap();
        assert!(out.fixes.is_empty());
        assert_eq!(out.outcome.execution.notes, "builtin fixer");
    }
}
