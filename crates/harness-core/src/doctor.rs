//! Readiness checks for the loop: is the onboarding doc in shape, and do any
//! runs carry the per-iteration artifacts that replay needs?

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifacts::{loop_dir, runs_dir};
use crate::docs_check::check_onboarding_install_readiness;
use crate::domain::{Finding, SCHEMA_VERSION};

const SUGGEST_FIX_DOCS: &str =
    "Fix onboarding install prompt issues before relying on loop scores.";
const SUGGEST_ENABLE_LAB: &str =
    "Run 'harness run --verbose-artifacts --max-iterations 1' to enable replay/forensics.";
const SUGGEST_READY: &str =
    "Lean path ready. Use 'harness judge' for daily checks and 'harness profile quality' for skill package checks.";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DoctorReport {
    pub schema_version: String,
    pub lean_ready: bool,
    pub lab_features_ready: bool,
    pub findings: Vec<Finding>,
    pub suggestions: Vec<String>,
    pub review_path: PathBuf,
}

pub fn review_path(repo_root: &Path) -> PathBuf {
    loop_dir(repo_root).join("maintainer").join("latest-review.md")
}

pub fn loop_doctor(repo_root: &Path) -> DoctorReport {
    let findings = check_onboarding_install_readiness(repo_root);
    let lab_ready = has_iteration_artifacts(repo_root);

    let mut suggestions = Vec::new();
    if !findings.is_empty() {
        suggestions.push(SUGGEST_FIX_DOCS.to_string());
    }
    if !lab_ready {
        suggestions.push(SUGGEST_ENABLE_LAB.to_string());
    }
    if suggestions.is_empty() {
        suggestions.push(SUGGEST_READY.to_string());
    }

    DoctorReport {
        schema_version: SCHEMA_VERSION.to_string(),
        lean_ready: findings.is_empty(),
        lab_features_ready: lab_ready,
        findings,
        suggestions,
        review_path: review_path(repo_root),
    }
}

pub fn render_doctor_markdown(report: &DoctorReport) -> String {
    let mut out = String::new();
    out.push_str("# Loop Doctor\n\n");
    out.push_str(&format!("- Lean ready: `{}`\n", report.lean_ready));
    out.push_str(&format!(
        "- Lab features ready: `{}`\n",
        report.lab_features_ready
    ));
    out.push_str(&format!(
        "- Review path: `{}`\n",
        report.review_path.display()
    ));

    out.push_str("\n## Findings\n\n");
    if report.findings.is_empty() {
        out.push_str("- none\n");
    }
    for f in &report.findings {
        out.push_str(&format!("- [{}] {} ({})\n", f.code, f.message, f.source));
    }

    out.push_str("\n## Suggestions\n\n");
    for s in &report.suggestions {
        out.push_str(&format!("- {s}\n"));
    }
    out
}

/// Any `runs/<id>/iter-*` directory counts.
fn has_iteration_artifacts(repo_root: &Path) -> bool {
    let Ok(runs) = std::fs::read_dir(runs_dir(repo_root)) else {
        return false;
    };
    runs.flatten()
        .filter(|run| run.path().is_dir())
        .filter_map(|run| std::fs::read_dir(run.path()).ok())
        .flat_map(|entries| entries.flatten())
        .any(|entry| {
            entry.path().is_dir() && entry.file_name().to_string_lossy().starts_with("iter-")
        })
}
