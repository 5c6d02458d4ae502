//! Run report writer: `latest-summary.json`, `findings.json` and a
//! timestamped Markdown report under `.docs/onboarding-loop/`.

use std::path::{Path, PathBuf};

use crate::artifacts::{loop_dir, timestamp_now, write_json};
use crate::domain::{Result, RunResult};

pub const LATEST_SUMMARY_FILE: &str = "latest-summary.json";
pub const FINDINGS_FILE: &str = "findings.json";

/// Paths written by [`write_reports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub summary: PathBuf,
    pub findings: PathBuf,
    pub markdown: PathBuf,
}

pub fn latest_summary_path(repo_root: &Path) -> PathBuf {
    loop_dir(repo_root).join(LATEST_SUMMARY_FILE)
}

/// Write the summary, the findings list and `<ts>-report.md`.
pub fn write_reports(repo_root: &Path, result: &RunResult) -> Result<ReportPaths> {
    let dir = loop_dir(repo_root);
    std::fs::create_dir_all(&dir)?;

    let summary = latest_summary_path(repo_root);
    write_json(&summary, result)?;
    let findings = dir.join(FINDINGS_FILE);
    write_json(&findings, &result.findings)?;

    let markdown = dir.join(format!("{}-report.md", timestamp_now()));
    std::fs::write(&markdown, render_run_report_md(result))?;

    Ok(ReportPaths {
        summary,
        findings,
        markdown,
    })
}

/// Render the human-readable run report.
pub fn render_run_report_md(result: &RunResult) -> String {
    let mut out = String::new();
    out.push_str("# Onboarding Loop Report\n\n");
    out.push_str(&format!(
        "- Scenario: {}\n- Score: {:.2}/10\n- Threshold: {:.2}\n- Pass: {}\n- Iterations: {}\n- Branch: {}\n\n",
        result.scenario.name,
        result.judge.score,
        result.judge.threshold,
        result.judge.pass,
        result.iterations,
        result.branch
    ));
    out.push_str("## Findings\n");
    for f in &result.findings {
        out.push_str(&format!("- [{}] {} ({})\n", f.code, f.message, f.source));
    }
    out
}
