//! Run-level records: `JudgeScore`, `RunResult`, `RoleExecution`, `CommitteeMeta`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::finding::Finding;
use super::scenario::ScenarioResult;

/// Schema version stamped on every persisted harness document.
pub const SCHEMA_VERSION: &str = "v1";

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Deterministic score of one scenario outcome plus its findings.
///
/// `score` is always within `[0, 10]` and `pass` holds iff `score >= threshold`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JudgeScore {
    pub score: f64,
    pub threshold: f64,
    pub pass: bool,
    pub ux_score: f64,
    pub quality_score: f64,
    pub penalty_score: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub planner_score: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub fixer_score: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub judger_score: f64,
    pub scenario_pass_rate: f64,
    #[serde(rename = "counter_intuitive_findings")]
    pub counter_intuitive: u32,
    pub hard_failures: u32,
}

/// Metadata recorded for the latest execution of one committee role.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoleExecution {
    /// Configured strategy label, `builtin` or `external` when unset.
    #[serde(default)]
    pub strategy: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub independent: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub artifacts: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr_tail: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CommitteeMeta {
    pub planner: RoleExecution,
    pub fixer: RoleExecution,
    pub judger: RoleExecution,
}

/// The result of one loop controller invocation.
///
/// Mutated in place iteration by iteration and finalized once the loop exits.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    pub schema_version: String,
    #[serde(default)]
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: DateTime<Utc>,
    #[serde(default)]
    pub scenario: ScenarioResult,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub judge: JudgeScore,
    pub iterations: u32,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub fixes_applied: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committee: Option<CommitteeMeta>,
}
