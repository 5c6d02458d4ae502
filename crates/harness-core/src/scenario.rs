//! Scenario runner.
//!
//! Executes an ordered list of shell steps fail-fast. A scenario without a
//! work dir runs in a fresh temporary directory on every call, so each run
//! (pre-fix and post-fix alike) starts from a clean environment.

use std::path::Path;

use chrono::Utc;
use tracing::{info, instrument};

use crate::config::ExecutionLimits;
use crate::domain::{Result, Scenario, ScenarioResult, Step, StepResult};
use crate::process::run_shell;

pub const DEFAULT_SCENARIO_NAME: &str = "default-onboarding";

/// The onboarding flow driven against a freshly built `bin`.
pub fn default_onboarding_scenario(bin: &Path) -> Scenario {
    let bin = bin.display();
    Scenario {
        name: DEFAULT_SCENARIO_NAME.to_string(),
        description: "Mimic user onboarding flow in a clean temp project".to_string(),
        work_dir: String::new(),
        steps: vec![
            Step::new("scaffold", format!("{bin} new --module example.com/demo demo")),
            Step::new(
                "add-command",
                format!("{bin} add command --dir ./demo --preset file-sync sync-data"),
            ),
            Step::new("doctor", format!("{bin} doctor --dir ./demo --json")),
            Step::new("verify", "cd demo && task verify"),
        ],
    }
}

/// Run every step of `scenario` in order, stopping at the first nonzero exit.
#[instrument(skip_all, fields(scenario = %scenario.name, steps = scenario.steps.len()))]
pub async fn run_scenario(scenario: &Scenario, limits: &ExecutionLimits) -> Result<ScenarioResult> {
    // Held until the end of the call; dropping removes the directory.
    let temp_dir;
    let work_dir: &Path = if scenario.work_dir.trim().is_empty() {
        temp_dir = tempfile::Builder::new().prefix("harness-loop-").tempdir()?;
        temp_dir.path()
    } else {
        Path::new(&scenario.work_dir)
    };

    let mut result = ScenarioResult {
        name: scenario.name.clone(),
        started_at: Utc::now(),
        finished_at: Utc::now(),
        ok: true,
        steps: Vec::with_capacity(scenario.steps.len()),
    };

    for step in &scenario.steps {
        let step_result = run_step(work_dir, step, limits).await?;
        let failed = !step_result.passed();
        info!(
            event = "scenario.step",
            step = %step_result.name,
            exit_code = step_result.exit_code,
            duration_ms = step_result.duration_ms,
        );
        result.steps.push(step_result);
        if failed {
            result.ok = false;
            break;
        }
    }

    result.finished_at = Utc::now();
    Ok(result)
}

async fn run_step(work_dir: &Path, step: &Step, limits: &ExecutionLimits) -> Result<StepResult> {
    let output = run_shell(&step.command, work_dir, &[], limits.step_timeout).await?;
    let combined_tail = output.combined_tail();
    Ok(StepResult {
        name: step.name.clone(),
        command: step.command.clone(),
        exit_code: output.exit_code,
        duration_ms: output.duration_ms,
        stdout: output.stdout,
        stderr: output.stderr,
        combined_tail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn scenario(steps: Vec<Step>) -> Scenario {
        Scenario {
            name: "test".to_string(),
            description: String::new(),
            work_dir: String::new(),
            steps,
        }
    }

    #[tokio::test]
    async fn test_single_echo_step_passes() {
        let result = run_scenario(
            &scenario(vec![Step::new("ok", "echo ok")]),
            &ExecutionLimits::unlimited(),
        )
        .await
        .unwrap();
        assert!(result.ok);
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].exit_code, 0);
        assert_eq!(result.steps[0].combined_tail, "ok");
        assert_eq!(result.steps[0].stdout, "ok\n");
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_first_failure() {
        let result = run_scenario(
            &scenario(vec![
                Step::new("first", "true"),
                Step::new("broken", "echo boom 1>&2; exit 2"),
                Step::new("never", "echo unreachable"),
            ]),
            &ExecutionLimits::unlimited(),
        )
        .await
        .unwrap();
        assert!(!result.ok);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.steps[1].exit_code, 2);
        assert_eq!(result.steps[1].combined_tail, "boom");
    }

    #[tokio::test]
    async fn test_each_run_gets_a_clean_directory() {
        let s = scenario(vec![Step::new("marker", "test ! -e marker && touch marker")]);
        let first = run_scenario(&s, &ExecutionLimits::unlimited()).await.unwrap();
        let second = run_scenario(&s, &ExecutionLimits::unlimited()).await.unwrap();
        assert!(first.ok);
        assert!(second.ok, "second run must not see the first run's files");
    }

    #[tokio::test]
    async fn test_explicit_work_dir_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let s = Scenario {
            work_dir: dir.path().display().to_string(),
            ..scenario(vec![Step::new("touch", "touch here")])
        };
        let result = run_scenario(&s, &ExecutionLimits::unlimited()).await.unwrap();
        assert!(result.ok);
        assert!(dir.path().join("here").exists());
    }

    #[tokio::test]
    async fn test_step_timeout_fails_the_scenario() {
        let limits = ExecutionLimits::unlimited().with_step_timeout(Duration::from_millis(100));
        let result = run_scenario(&scenario(vec![Step::new("hang", "sleep 5")]), &limits)
            .await
            .unwrap();
        assert!(!result.ok);
        assert_eq!(result.steps[0].exit_code, crate::process::TIMEOUT_EXIT_CODE);
        assert!(result.steps[0].combined_tail.contains("timed out"));
    }

    #[test]
    fn test_default_onboarding_scenario_shape() {
        let s = default_onboarding_scenario(Path::new("/tmp/bin/agentcli-loop"));
        let names: Vec<&str> = s.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["scaffold", "add-command", "doctor", "verify"]);
        assert!(s.steps[0].command.starts_with("/tmp/bin/agentcli-loop new"));
        assert!(s.work_dir.is_empty());
    }
}
