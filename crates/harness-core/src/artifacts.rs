//! On-disk artifact layout under `<repo>/.docs/onboarding-loop/`.
//!
//! ```text
//! .docs/onboarding-loop/
//!   latest-summary.json, findings.json, <ts>-report.md
//!   bin/
//!   compare/<ts>.md
//!   runs/<run_id>/final-report.json
//!   runs/<run_id>/iter-NN/{planner,fixer,judger}-{context.json,output.json,stdout.log,stderr.log}
//! ```

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::{HarnessError, Result};

pub const LOOP_DIR: &str = ".docs/onboarding-loop";
pub const FINAL_REPORT_FILE: &str = "final-report.json";

/// Timestamp format shared by run ids and report file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

pub fn loop_dir(repo_root: &Path) -> PathBuf {
    repo_root.join(LOOP_DIR)
}

pub fn runs_dir(repo_root: &Path) -> PathBuf {
    loop_dir(repo_root).join("runs")
}

pub fn run_dir(repo_root: &Path, run_id: &str) -> PathBuf {
    runs_dir(repo_root).join(run_id)
}

pub fn iteration_dir(run_dir: &Path, iteration: u32) -> PathBuf {
    run_dir.join(format!("iter-{iteration:02}"))
}

pub fn final_report_path(repo_root: &Path, run_id: &str) -> PathBuf {
    run_dir(repo_root, run_id).join(FINAL_REPORT_FILE)
}

pub fn compare_dir(repo_root: &Path) -> PathBuf {
    loop_dir(repo_root).join("compare")
}

pub fn bin_dir(repo_root: &Path) -> PathBuf {
    loop_dir(repo_root).join("bin")
}

/// Current UTC time in [`TIMESTAMP_FORMAT`].
pub fn timestamp_now() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Write `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(value)?;
    std::fs::write(path, body)?;
    Ok(())
}

/// Read and decode a JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read(path).map_err(|source| HarnessError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&raw)?)
}
