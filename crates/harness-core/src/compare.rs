//! Compare two completed runs by their persisted `final-report.json`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::artifacts::{compare_dir, final_report_path, read_json, timestamp_now, write_json};
use crate::domain::{HarnessError, Result, RunResult, SCHEMA_VERSION};

/// Run B minus run A.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompareDelta {
    pub score: f64,
    pub pass_delta: i64,
    pub findings_delta: i64,
    pub iterations_delta: i64,
    pub fixes_applied_delta: i64,
}

impl CompareDelta {
    pub fn between(a: &RunResult, b: &RunResult) -> Self {
        Self {
            score: b.judge.score - a.judge.score,
            pass_delta: i64::from(b.judge.pass) - i64::from(a.judge.pass),
            findings_delta: b.findings.len() as i64 - a.findings.len() as i64,
            iterations_delta: i64::from(b.iterations) - i64::from(a.iterations),
            fixes_applied_delta: b.fixes_applied.len() as i64 - a.fixes_applied.len() as i64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompareReport {
    pub schema_version: String,
    pub run_a: RunResult,
    pub run_b: RunResult,
    pub delta: CompareDelta,
}

impl CompareReport {
    pub fn new(run_a: RunResult, run_b: RunResult) -> Self {
        let delta = CompareDelta::between(&run_a, &run_b);
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            run_a,
            run_b,
            delta,
        }
    }
}

/// Load both runs' final reports and compute the delta.
pub fn compare_runs(repo_root: &Path, run_a: &str, run_b: &str) -> Result<CompareReport> {
    if run_a.trim().is_empty() || run_b.trim().is_empty() {
        return Err(HarnessError::Usage(
            "compare requires both --run-a and --run-b".to_string(),
        ));
    }
    let a: RunResult = read_json(&final_report_path(repo_root, run_a))?;
    let b: RunResult = read_json(&final_report_path(repo_root, run_b))?;
    Ok(CompareReport::new(a, b))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompareFormat {
    #[default]
    Json,
    Markdown,
}

impl FromStr for CompareFormat {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "json" => Ok(CompareFormat::Json),
            "md" => Ok(CompareFormat::Markdown),
            _ => Err(HarnessError::Usage(format!("unsupported compare format: {s}"))),
        }
    }
}

/// Render the report as Markdown.
pub fn render_compare_markdown(report: &CompareReport) -> String {
    let (a, b) = (&report.run_a.judge, &report.run_b.judge);
    let d = &report.delta;
    let mut out = String::new();
    out.push_str("# Loop Compare Report\n\n");
    out.push_str(&format!("- Run A: `{}`\n", report.run_a.run_id));
    out.push_str(&format!("- Run B: `{}`\n", report.run_b.run_id));
    out.push_str(&format!("- Score delta (B-A): `{:.2}`\n", d.score));
    out.push_str(&format!("- Pass delta (B-A): `{}`\n", d.pass_delta));
    out.push_str(&format!("- Findings delta (B-A): `{}`\n", d.findings_delta));
    out.push_str(&format!("- Iterations delta (B-A): `{}`\n", d.iterations_delta));
    out.push_str(&format!("- Fixes delta (B-A): `{}`\n", d.fixes_applied_delta));
    out.push_str("\n## Judge Breakdown\n\n");
    out.push_str("| Metric | Run A | Run B |\n");
    out.push_str("|---|---:|---:|\n");
    for (metric, va, vb) in [
        ("Total score", a.score, b.score),
        ("UX", a.ux_score, b.ux_score),
        ("Quality", a.quality_score, b.quality_score),
        ("Penalty", a.penalty_score, b.penalty_score),
        ("Planner", a.planner_score, b.planner_score),
        ("Fixer", a.fixer_score, b.fixer_score),
        ("Judger", a.judger_score, b.judger_score),
    ] {
        out.push_str(&format!("| {metric} | {va:.2} | {vb:.2} |\n"));
    }
    out
}

/// Persist the report in `format`.
///
/// Without `out`, JSON is not written (`None`; the caller prints it) and
/// Markdown goes to `.docs/onboarding-loop/compare/<ts>.md`.
pub fn write_compare_output(
    repo_root: &Path,
    report: &CompareReport,
    format: CompareFormat,
    out: Option<&Path>,
) -> Result<Option<PathBuf>> {
    let path = match (out, format) {
        (Some(path), _) => path.to_path_buf(),
        (None, CompareFormat::Json) => return Ok(None),
        (None, CompareFormat::Markdown) => compare_dir(repo_root).join(format!("{}.md", timestamp_now())),
    };

    match format {
        CompareFormat::Json => write_json(&path, report)?,
        CompareFormat::Markdown => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, render_compare_markdown(report))?;
        }
    }
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Finding, JudgeScore};

    fn run(id: &str, score: f64, pass: bool, findings: usize, iterations: u32) -> RunResult {
        RunResult {
            schema_version: "v1".to_string(),
            run_id: id.to_string(),
            judge: JudgeScore {
                score,
                pass,
                ux_score: 5.0,
                quality_score: 5.0,
                penalty_score: 10.0 - score,
                ..Default::default()
            },
            findings: (0..findings)
                .map(|i| Finding::new(format!("f{i}"), "high", "m", "s"))
                .collect(),
            iterations,
            ..Default::default()
        }
    }

    #[test]
    fn test_delta_is_b_minus_a() {
        let d = CompareDelta::between(&run("a", 8.0, false, 3, 3), &run("b", 9.5, true, 1, 1));
        assert!((d.score - 1.5).abs() < 1e-9);
        assert_eq!(d.pass_delta, 1);
        assert_eq!(d.findings_delta, -2);
        assert_eq!(d.iterations_delta, -2);
        assert_eq!(d.fixes_applied_delta, 0);
    }

    #[test]
    fn test_render_compare_markdown_golden() {
        let report = CompareReport::new(run("a", 9.0, true, 0, 1), run("b", 9.5, true, 0, 1));
        let expected = "# Loop Compare Report\n\n\
- Run A: `a`\n\
- Run B: `b`\n\
- Score delta (B-A): `0.50`\n\
- Pass delta (B-A): `0`\n\
- Findings delta (B-A): `0`\n\
- Iterations delta (B-A): `0`\n\
- Fixes delta (B-A): `0`\n\
\n## Judge Breakdown\n\n\
| Metric | Run A | Run B |\n\
|---|---:|---:|\n\
| Total score | 9.00 | 9.50 |\n\
| UX | 5.00 | 5.00 |\n\
| Quality | 5.00 | 5.00 |\n\
| Penalty | 1.00 | 0.50 |\n\
| Planner | 0.00 | 0.00 |\n\
| Fixer | 0.00 | 0.00 |\n\
| Judger | 0.00 | 0.00 |\n";
        assert_eq!(render_compare_markdown(&report), expected);
    }

    #[test]
    fn test_compare_format_parse() {
        assert_eq!("".parse::<CompareFormat>().unwrap(), CompareFormat::Json);
        assert_eq!("MD".parse::<CompareFormat>().unwrap(), CompareFormat::Markdown);
        let err = "html".parse::<CompareFormat>().unwrap_err();
        assert_eq!(err.kind(), crate::domain::ErrorKind::Usage);
    }

    #[test]
    fn test_write_json_without_out_returns_none() {
        let repo = tempfile::tempdir().unwrap();
        let report = CompareReport::new(run("a", 9.0, true, 0, 1), run("b", 9.0, true, 0, 1));
        let path = write_compare_output(repo.path(), &report, CompareFormat::Json, None).unwrap();
        assert!(path.is_none());
        assert!(!compare_dir(repo.path()).exists());
    }

    #[test]
    fn test_write_json_to_out_path() {
        let repo = tempfile::tempdir().unwrap();
        let out = repo.path().join("compare.json");
        let report = CompareReport::new(run("a", 9.0, true, 0, 1), run("b", 9.0, true, 0, 1));
        let path = write_compare_output(repo.path(), &report, CompareFormat::Json, Some(&out))
            .unwrap();
        assert_eq!(path, Some(out.clone()));
        let back: CompareReport = read_json(&out).unwrap();
        assert_eq!(back.run_b.run_id, "b");
    }

    #[test]
    fn test_write_markdown_defaults_to_compare_dir() {
        let repo = tempfile::tempdir().unwrap();
        let report = CompareReport::new(run("a", 9.0, true, 0, 1), run("b", 9.5, true, 0, 1));
        let path = write_compare_output(repo.path(), &report, CompareFormat::Markdown, None)
            .unwrap()
            .unwrap();
        assert!(path.starts_with(compare_dir(repo.path())));
        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.contains("# Loop Compare Report"));
    }

    #[test]
    fn test_compare_runs_reads_final_reports() {
        let repo = tempfile::tempdir().unwrap();
        write_json(&final_report_path(repo.path(), "a"), &run("a", 8.0, false, 2, 2)).unwrap();
        write_json(&final_report_path(repo.path(), "b"), &run("b", 9.0, true, 0, 1)).unwrap();
        let report = compare_runs(repo.path(), "a", "b").unwrap();
        assert_eq!(report.delta.findings_delta, -2);
        assert_eq!(report.delta.pass_delta, 1);
    }

    #[test]
    fn test_compare_runs_missing_report_is_file_io() {
        let repo = tempfile::tempdir().unwrap();
        let err = compare_runs(repo.path(), "a", "b").unwrap_err();
        assert_eq!(err.kind(), crate::domain::ErrorKind::FileIo);
        let err = compare_runs(repo.path(), "", "b").unwrap_err();
        assert_eq!(err.kind(), crate::domain::ErrorKind::Usage);
    }
}
