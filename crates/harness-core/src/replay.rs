//! Replay one recorded iteration: re-run the steps captured in its planner
//! context and judge the fresh outcome.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::artifacts::{iteration_dir, read_json, run_dir};
use crate::config::{ExecutionLimits, DEFAULT_THRESHOLD};
use crate::detector::detect_findings;
use crate::domain::{
    Finding, HarnessError, JudgeScore, Result, Scenario, ScenarioResult, Step, SCHEMA_VERSION,
};
use crate::judge::judge;
use crate::roles::RoleName;
use crate::scenario::run_scenario;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplayReport {
    pub schema_version: String,
    pub run_id: String,
    pub iteration: u32,
    /// Scenario outcome recorded in the artifact.
    pub baseline: ScenarioResult,
    pub replay: ScenarioResult,
    pub replay_judge: JudgeScore,
    pub replay_findings: Vec<Finding>,
}

#[derive(Debug, Deserialize)]
struct RecordedContext {
    #[serde(default)]
    scenario: ScenarioResult,
}

/// Re-run iteration `iteration` of `run_id` in a fresh temporary directory.
///
/// Only scenario findings are re-detected; documentation checks are not
/// re-applied. A non-positive `threshold` falls back to the default.
#[instrument(skip(repo_root, limits))]
pub async fn replay_iteration(
    repo_root: &Path,
    run_id: &str,
    iteration: u32,
    threshold: f64,
    limits: &ExecutionLimits,
) -> Result<ReplayReport> {
    if run_id.trim().is_empty() {
        return Err(HarnessError::Usage("run id is required".to_string()));
    }
    if iteration == 0 {
        return Err(HarnessError::Usage("iteration must be >= 1".to_string()));
    }

    let context_path = iteration_dir(&run_dir(repo_root, run_id), iteration)
        .join(RoleName::Planner.artifact_file("context.json"));
    if !context_path.is_file() {
        return Err(HarnessError::ArtifactMissing {
            message: format!("replay artifacts not found for run {run_id} iter {iteration}"),
            hint: "re-run the loop with --verbose-artifacts to enable replay".to_string(),
        });
    }
    let recorded: RecordedContext = read_json(&context_path)?;
    if recorded.scenario.steps.is_empty() {
        return Err(HarnessError::ContractValidation(
            "no scenario steps found in replay context".to_string(),
        ));
    }

    let scenario = Scenario {
        name: format!("replay-{run_id}"),
        description: "replay of recorded iteration".to_string(),
        work_dir: String::new(),
        steps: recorded
            .scenario
            .steps
            .iter()
            .map(|s| Step::new(s.name.clone(), s.command.clone()))
            .collect(),
    };
    let replay = run_scenario(&scenario, limits).await?;
    let findings = detect_findings(&replay);
    let threshold = if threshold > 0.0 {
        threshold
    } else {
        DEFAULT_THRESHOLD
    };
    let replay_judge = judge(&replay, &findings, threshold);

    Ok(ReplayReport {
        schema_version: SCHEMA_VERSION.to_string(),
        run_id: run_id.to_string(),
        iteration,
        baseline: recorded.scenario,
        replay,
        replay_judge,
        replay_findings: findings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    fn write_context(repo: &Path, run_id: &str, iteration: u32, ctx: serde_json::Value) {
        let dir = iteration_dir(&run_dir(repo, run_id), iteration);
        crate::artifacts::write_json(&dir.join("planner-context.json"), &ctx).unwrap();
    }

    #[tokio::test]
    async fn test_replay_reruns_recorded_steps() {
        let repo = tempfile::tempdir().unwrap();
        write_context(
            repo.path(),
            "r1",
            1,
            serde_json::json!({
                "scenario": {"name": "seed", "steps": [{"name": "ok", "command": "echo ok"}]}
            }),
        );
        let report = replay_iteration(repo.path(), "r1", 1, 9.0, &ExecutionLimits::unlimited())
            .await
            .unwrap();
        assert!(report.replay.ok);
        assert_eq!(report.replay.name, "replay-r1");
        assert_eq!(report.baseline.name, "seed");
        assert!(report.replay_findings.is_empty());
        assert!(report.replay_judge.pass);
    }

    #[tokio::test]
    async fn test_replay_detects_failures() {
        let repo = tempfile::tempdir().unwrap();
        write_context(
            repo.path(),
            "r2",
            2,
            serde_json::json!({
                "scenario": {"name": "seed", "ok": false, "steps": [
                    {"name": "verify", "command": "echo 'task: Failed to run task \"verify\": exit status 1'; exit 1"}
                ]}
            }),
        );
        let report = replay_iteration(repo.path(), "r2", 2, 9.0, &ExecutionLimits::unlimited())
            .await
            .unwrap();
        assert!(!report.replay.ok);
        let codes = crate::domain::finding_codes(&report.replay_findings);
        assert!(codes.contains(&"step_failed".to_string()));
        assert!(codes.contains(&"counter_intuitive_abort".to_string()));
        assert!(!report.replay_judge.pass);
    }

    #[tokio::test]
    async fn test_replay_usage_errors() {
        let repo = tempfile::tempdir().unwrap();
        let limits = ExecutionLimits::unlimited();
        let err = replay_iteration(repo.path(), "", 1, 9.0, &limits).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = replay_iteration(repo.path(), "r1", 0, 9.0, &limits).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[tokio::test]
    async fn test_replay_missing_artifacts_hint() {
        let repo = tempfile::tempdir().unwrap();
        let err = replay_iteration(repo.path(), "r9", 1, 9.0, &ExecutionLimits::unlimited())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("replay artifacts not found for run r9 iter 1"));
        assert!(msg.contains("--verbose-artifacts"));
    }

    #[tokio::test]
    async fn test_replay_without_steps_fails() {
        let repo = tempfile::tempdir().unwrap();
        write_context(
            repo.path(),
            "r3",
            1,
            serde_json::json!({"scenario": {"name": "seed", "steps": []}}),
        );
        let err = replay_iteration(repo.path(), "r3", 1, 9.0, &ExecutionLimits::unlimited())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no scenario steps"));
    }
}
