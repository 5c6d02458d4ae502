//! Deterministic remediation catalogue.
//!
//! Each known finding code maps to one fix. Unknown codes are skipped.

use std::path::Path;

use tracing::{debug, info};

use crate::domain::{codes, Finding, HarnessError, Result};
use crate::process::run_shell;

/// Remediation commands keyed by finding code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixer {
    format_command: String,
    format_description: String,
}

impl Default for Fixer {
    fn default() -> Self {
        Self {
            format_command: "gofmt -w scaffold.go".to_string(),
            format_description: "gofmt scaffold.go".to_string(),
        }
    }
}

impl Fixer {
    /// Replace the command run for `generated_go_not_formatted`.
    pub fn with_format_command(
        mut self,
        command: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.format_command = command.into();
        self.format_description = description.into();
        self
    }

    /// Apply the fix for every finding that has one, in input order.
    ///
    /// Returns a description of each applied fix. The first failing fix
    /// command aborts with an execution error.
    pub async fn apply(&self, repo_root: &Path, findings: &[Finding]) -> Result<Vec<String>> {
        let mut applied = Vec::new();
        for finding in findings {
            match finding.code.as_str() {
                codes::GENERATED_GO_NOT_FORMATTED => {
                    let out = run_shell(&self.format_command, repo_root, &[], None).await?;
                    if !out.success() {
                        return Err(HarnessError::Execution(format!(
                            "apply gofmt fix: exit code {}\n{}",
                            out.exit_code,
                            out.combined_tail()
                        )));
                    }
                    applied.push(self.format_description.clone());
                }
                codes::COUNTER_INTUITIVE_ABORT => {
                    applied.push("recorded counter-intuitive issue".to_string());
                }
                other => debug!(code = %other, "no fix registered"),
            }
        }
        if !applied.is_empty() {
            info!(event = "fixer.applied", count = applied.len());
        }
        Ok(applied)
    }
}

/// Apply the default catalogue to `findings`, running commands in `repo_root`.
pub async fn apply_fixes(repo_root: &Path, findings: &[Finding]) -> Result<Vec<String>> {
    Fixer::default().apply(repo_root, findings).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::finding::{SEVERITY_HIGH, SEVERITY_MEDIUM};

    fn finding(code: &str, severity: &str) -> Finding {
        Finding::new(code, severity, "msg", "test")
    }

    #[tokio::test]
    async fn test_empty_findings_apply_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let applied = apply_fixes(dir.path(), &[]).await.unwrap();
        assert!(applied.is_empty());
    }

    #[tokio::test]
    async fn test_abort_finding_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let applied = apply_fixes(
            dir.path(),
            &[finding(codes::COUNTER_INTUITIVE_ABORT, SEVERITY_MEDIUM)],
        )
        .await
        .unwrap();
        assert_eq!(applied, vec!["recorded counter-intuitive issue".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_and_step_failed_codes_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let applied = apply_fixes(
            dir.path(),
            &[
                finding(codes::STEP_FAILED, SEVERITY_HIGH),
                finding("brand_new_code", SEVERITY_HIGH),
            ],
        )
        .await
        .unwrap();
        assert!(applied.is_empty());
    }

    #[tokio::test]
    async fn test_format_fix_runs_command_in_repo_root() {
        let dir = tempfile::tempdir().unwrap();
        let fixer = Fixer::default().with_format_command("touch formatted", "format scaffold");
        let applied = fixer
            .apply(
                dir.path(),
                &[finding(codes::GENERATED_GO_NOT_FORMATTED, SEVERITY_HIGH)],
            )
            .await
            .unwrap();
        assert_eq!(applied, vec!["format scaffold".to_string()]);
        assert!(dir.path().join("formatted").exists());
    }

    #[tokio::test]
    async fn test_failing_format_fix_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let fixer = Fixer::default().with_format_command("echo nope 1>&2; exit 2", "x");
        let err = fixer
            .apply(
                dir.path(),
                &[finding(codes::GENERATED_GO_NOT_FORMATTED, SEVERITY_HIGH)],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::domain::ErrorKind::Execution);
        assert!(err.to_string().contains("apply gofmt fix"));
    }
}
