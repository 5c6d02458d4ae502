//! Behavior regression: reduce a run to a deterministic snapshot, store it as
//! a baseline and diff later runs against it.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::artifacts::{read_json, write_json};
use crate::config::resolve_repo_path;
use crate::domain::{HarnessError, Result, RunResult, SCHEMA_VERSION};
use crate::obs;

pub const BASELINE_KIND: &str = "loop_behavior";

// ---------------------------------------------------------------------------
// Snapshot model
// ---------------------------------------------------------------------------

/// The timing-free, order-stable projection of a `RunResult`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BehaviorSnapshot {
    pub mode: String,
    pub iterations: u32,
    pub scenario: ScenarioSnapshot,
    pub findings: Vec<FindingSnapshot>,
    pub judge: JudgeSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committee: Option<CommitteeSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScenarioSnapshot {
    pub name: String,
    pub ok: bool,
    pub steps: Vec<StepSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepSnapshot {
    pub name: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct FindingSnapshot {
    pub code: String,
    pub severity: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JudgeSnapshot {
    pub threshold: f64,
    pub score: f64,
    pub pass: bool,
    pub hard_failures: u32,
    pub counter_intuitive_findings: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitteeSnapshot {
    pub planner_strategy: String,
    pub fixer_strategy: String,
    pub judger_strategy: String,
}

impl BehaviorSnapshot {
    /// SHA-256 hex digest of the snapshot's JSON encoding.
    pub fn digest(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

/// Project `result` onto its behavior. Findings are sorted by
/// (code, severity, source) so detection order does not matter.
pub fn build_behavior_snapshot(result: &RunResult) -> BehaviorSnapshot {
    let mut findings: Vec<FindingSnapshot> = result
        .findings
        .iter()
        .map(|f| FindingSnapshot {
            code: f.code.clone(),
            severity: f.severity.clone(),
            source: f.source.clone(),
        })
        .collect();
    findings.sort();

    BehaviorSnapshot {
        mode: result.mode.clone(),
        iterations: result.iterations,
        scenario: ScenarioSnapshot {
            name: result.scenario.name.clone(),
            ok: result.scenario.ok,
            steps: result
                .scenario
                .steps
                .iter()
                .map(|s| StepSnapshot {
                    name: s.name.clone(),
                    exit_code: s.exit_code,
                })
                .collect(),
        },
        findings,
        judge: JudgeSnapshot {
            threshold: result.judge.threshold,
            score: result.judge.score,
            pass: result.judge.pass,
            hard_failures: result.judge.hard_failures,
            counter_intuitive_findings: result.judge.counter_intuitive,
        },
        committee: result.committee.as_ref().map(|c| CommitteeSnapshot {
            planner_strategy: c.planner.strategy.clone(),
            fixer_strategy: c.fixer.strategy.clone(),
            judger_strategy: c.judger.strategy.clone(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// One field whose value differs from the baseline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegressionDrift {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Default)]
struct DriftCollector {
    drifts: Vec<RegressionDrift>,
}

impl DriftCollector {
    fn check<T: PartialEq + Display>(&mut self, path: impl Into<String>, expected: T, actual: T) {
        if expected != actual {
            self.drifts.push(RegressionDrift {
                path: path.into(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
    }

    fn check_score(&mut self, path: &str, expected: f64, actual: f64) {
        self.check(path, round3(expected), round3(actual));
    }
}

fn round3(v: f64) -> f64 {
    if v.is_finite() {
        (v * 1000.0).round() / 1000.0
    } else {
        v
    }
}

/// Field-by-field diff of two snapshots, in a fixed path order.
///
/// Arrays report a length drift and then compare the overlapping prefix
/// position by position.
pub fn compare_behavior_snapshot(
    expected: &BehaviorSnapshot,
    actual: &BehaviorSnapshot,
) -> Vec<RegressionDrift> {
    let mut c = DriftCollector::default();

    c.check("mode", expected.mode.as_str(), actual.mode.as_str());
    c.check("iterations", expected.iterations, actual.iterations);
    c.check("scenario.name", expected.scenario.name.as_str(), actual.scenario.name.as_str());
    c.check("scenario.ok", expected.scenario.ok, actual.scenario.ok);

    let (want, got) = (&expected.scenario.steps, &actual.scenario.steps);
    c.check("scenario.steps.length", want.len(), got.len());
    for (i, (w, g)) in want.iter().zip(got).enumerate() {
        c.check(format!("scenario.steps[{i}].name"), w.name.as_str(), g.name.as_str());
        c.check(format!("scenario.steps[{i}].exit_code"), w.exit_code, g.exit_code);
    }

    let (want, got) = (&expected.findings, &actual.findings);
    c.check("findings.length", want.len(), got.len());
    for (i, (w, g)) in want.iter().zip(got).enumerate() {
        c.check(format!("findings[{i}].code"), w.code.as_str(), g.code.as_str());
        c.check(format!("findings[{i}].severity"), w.severity.as_str(), g.severity.as_str());
        c.check(format!("findings[{i}].source"), w.source.as_str(), g.source.as_str());
    }

    let (want, got) = (&expected.judge, &actual.judge);
    c.check("judge.pass", want.pass, got.pass);
    c.check("judge.hard_failures", want.hard_failures, got.hard_failures);
    c.check(
        "judge.counter_intuitive_findings",
        want.counter_intuitive_findings,
        got.counter_intuitive_findings,
    );
    c.check_score("judge.threshold", want.threshold, got.threshold);
    c.check_score("judge.score", want.score, got.score);

    match (&expected.committee, &actual.committee) {
        (Some(want), Some(got)) => {
            c.check(
                "committee.planner_strategy",
                want.planner_strategy.as_str(),
                got.planner_strategy.as_str(),
            );
            c.check(
                "committee.fixer_strategy",
                want.fixer_strategy.as_str(),
                got.fixer_strategy.as_str(),
            );
            c.check(
                "committee.judger_strategy",
                want.judger_strategy.as_str(),
                got.judger_strategy.as_str(),
            );
        }
        (want, got) => c.check("committee.present", want.is_some(), got.is_some()),
    }

    c.drifts
}

// ---------------------------------------------------------------------------
// Baseline I/O
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegressionBaseline {
    #[serde(default)]
    pub schema_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub profile: String,
    pub generated_at: Option<DateTime<Utc>>,
    pub snapshot: BehaviorSnapshot,
}

impl RegressionBaseline {
    pub fn new(profile: impl Into<String>, snapshot: BehaviorSnapshot) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            kind: BASELINE_KIND.to_string(),
            profile: profile.into(),
            generated_at: Some(Utc::now()),
            snapshot,
        }
    }
}

/// Read and validate a baseline. An empty `kind` is accepted.
pub fn read_regression_baseline(path: &Path) -> Result<RegressionBaseline> {
    let baseline: RegressionBaseline = read_json(path)?;
    if baseline.schema_version != SCHEMA_VERSION {
        return Err(HarnessError::ContractValidation(format!(
            "invalid baseline schema_version: {:?}",
            baseline.schema_version
        )));
    }
    if !baseline.kind.is_empty() && baseline.kind != BASELINE_KIND {
        return Err(HarnessError::ContractValidation(format!(
            "invalid baseline kind: {:?}",
            baseline.kind
        )));
    }
    Ok(baseline)
}

/// Write `baseline`, filling schema version, kind and timestamp when unset.
pub fn write_regression_baseline(path: &Path, mut baseline: RegressionBaseline) -> Result<()> {
    if baseline.schema_version.is_empty() {
        baseline.schema_version = SCHEMA_VERSION.to_string();
    }
    if baseline.kind.is_empty() {
        baseline.kind = BASELINE_KIND.to_string();
    }
    if baseline.generated_at.is_none() {
        baseline.generated_at = Some(Utc::now());
    }
    write_json(path, &baseline)
}

/// `<repo>/testdata/regression/loop-<profile>.behavior-baseline.json` unless
/// an explicit path is given (resolved against the repo root).
pub fn resolve_baseline_path(repo_root: &Path, profile: &str, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) if !path.as_os_str().is_empty() => resolve_repo_path(repo_root, path),
        _ => repo_root
            .join("testdata")
            .join("regression")
            .join(format!("loop-{profile}.behavior-baseline.json")),
    }
}

// ---------------------------------------------------------------------------
// Regression check
// ---------------------------------------------------------------------------

/// Outcome of one regression check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegressionReport {
    pub schema_version: String,
    pub profile: String,
    pub baseline_path: PathBuf,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub baseline_written: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub run_id: String,
    pub pass: bool,
    pub drift_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drifts: Vec<RegressionDrift>,
    pub snapshot_digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Compare `result` against the baseline at `baseline_path`, or record it as
/// the new baseline when `write_baseline` is set.
///
/// A missing or invalid baseline and any drift are reported as `pass = false`.
/// Only a failure to write a requested baseline is an error.
#[instrument(skip(result), fields(run_id = %result.run_id))]
pub fn check_regression(
    profile: &str,
    baseline_path: &Path,
    write_baseline: bool,
    result: &RunResult,
) -> Result<RegressionReport> {
    let snapshot = build_behavior_snapshot(result);
    let mut report = RegressionReport {
        schema_version: SCHEMA_VERSION.to_string(),
        profile: profile.to_string(),
        baseline_path: baseline_path.to_path_buf(),
        baseline_written: false,
        run_id: result.run_id.clone(),
        pass: false,
        drift_count: 0,
        drifts: Vec::new(),
        snapshot_digest: snapshot.digest()?,
        error: None,
    };

    if write_baseline {
        write_regression_baseline(baseline_path, RegressionBaseline::new(profile, snapshot))?;
        report.baseline_written = true;
        report.pass = true;
        obs::emit_regression_checked(profile, true, 0);
        return Ok(report);
    }

    match read_regression_baseline(baseline_path) {
        Ok(baseline) => {
            report.drifts = compare_behavior_snapshot(&baseline.snapshot, &snapshot);
            report.drift_count = report.drifts.len();
            report.pass = report.drifts.is_empty();
        }
        Err(e) => {
            report.error = Some(format!(
                "regression baseline missing or invalid: {e}; create it with --write-baseline"
            ));
        }
    }
    obs::emit_regression_checked(profile, report.pass, report.drift_count);
    Ok(report)
}
