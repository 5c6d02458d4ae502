//! Condensed view of the most recent run for maintainers.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifacts::read_json;
use crate::domain::{Finding, Result, RunResult, SCHEMA_VERSION};
use crate::reporter::latest_summary_path;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReviewData {
    pub schema_version: String,
    pub run_id: String,
    pub mode: String,
    pub score: f64,
    pub threshold: f64,
    pub pass: bool,
    pub iterations: u32,
    pub branch: String,
    pub finished_at: DateTime<Utc>,
    pub findings: Vec<Finding>,
}

impl From<RunResult> for ReviewData {
    fn from(r: RunResult) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: r.run_id,
            mode: r.mode,
            score: r.judge.score,
            threshold: r.judge.threshold,
            pass: r.judge.pass,
            iterations: r.iterations,
            branch: r.branch,
            finished_at: r.finished_at,
            findings: r.findings,
        }
    }
}

/// Read `latest-summary.json`.
pub fn load_review_data(repo_root: &Path) -> Result<ReviewData> {
    let run: RunResult = read_json(&latest_summary_path(repo_root))?;
    Ok(run.into())
}
