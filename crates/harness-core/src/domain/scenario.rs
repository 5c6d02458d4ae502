//! Scenario vocabulary: `Step`, `Scenario`, `StepResult`, `ScenarioResult`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One shell command in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    pub command: String,
}

impl Step {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
        }
    }
}

/// An ordered list of shell steps executed in one working directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    /// Working directory for every step. Empty means a fresh temp dir per run.
    #[serde(default)]
    pub work_dir: String,
    pub steps: Vec<Step>,
}

/// Captured outcome of a single step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    /// Trailing 800 characters of trimmed stdout + stderr.
    #[serde(default)]
    pub combined_tail: String,
}

impl StepResult {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// Outcome of a scenario run.
///
/// `ok` holds iff every recorded step exited 0. Execution stops at the first
/// failing step, so `steps` may be shorter than the scenario's step list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScenarioResult {
    pub name: String,
    #[serde(default)]
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: DateTime<Utc>,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub steps: Vec<StepResult>,
}

impl ScenarioResult {
    /// First step with a nonzero exit code, if any.
    pub fn first_failure(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.passed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_result_passed() {
        let step = StepResult {
            name: "doctor".to_string(),
            exit_code: 0,
            ..Default::default()
        };
        assert!(step.passed());

        let step = StepResult {
            exit_code: 2,
            ..step
        };
        assert!(!step.passed());
    }

    #[test]
    fn test_first_failure_returns_earliest_failing_step() {
        let result = ScenarioResult {
            name: "s".to_string(),
            ok: false,
            steps: vec![
                StepResult {
                    name: "scaffold".to_string(),
                    exit_code: 0,
                    ..Default::default()
                },
                StepResult {
                    name: "verify".to_string(),
                    exit_code: 1,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(result.first_failure().map(|s| s.name.as_str()), Some("verify"));
    }

    #[test]
    fn test_scenario_without_work_dir_deserializes() {
        let json = r#"{"name":"seed","description":"","steps":[{"name":"ok","command":"echo ok"}]}"#;
        let scenario: Scenario = serde_json::from_str(json).expect("deserialize");
        assert!(scenario.work_dir.is_empty());
        assert_eq!(scenario.steps[0], Step::new("ok", "echo ok"));
    }
}
