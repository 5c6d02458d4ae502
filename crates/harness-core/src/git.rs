//! Git helpers for recording and committing loop results.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::domain::{HarnessError, Result};

fn run_git(repo_dir: &Path, args: &[&str]) -> Result<String> {
    debug!(args = ?args, "running git");
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .map_err(|e| HarnessError::GitError(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        return Err(HarnessError::GitError(format!(
            "git {} failed: {}{}",
            args.join(" "),
            stdout.trim_end(),
            stderr.trim_end()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Name of the checked-out branch, or an empty string when it cannot be read
/// (not a repository, detached HEAD, git missing).
pub fn current_branch(repo_dir: &Path) -> String {
    run_git(repo_dir, &["branch", "--show-current"])
        .map(|out| out.trim().to_string())
        .unwrap_or_default()
}

/// Create or reset `branch` to the current HEAD and check it out.
pub fn ensure_branch(repo_dir: &Path, branch: &str) -> Result<()> {
    run_git(repo_dir, &["checkout", "-B", branch]).map(|_| ())
}

/// Stage and commit everything when the work tree is dirty.
///
/// Returns whether a commit was made.
pub fn commit_if_dirty(repo_dir: &Path, message: &str) -> Result<bool> {
    let status = run_git(repo_dir, &["status", "--porcelain"])?;
    if status.trim().is_empty() {
        return Ok(false);
    }
    run_git(repo_dir, &["add", "-A"])?;
    run_git(repo_dir, &["commit", "-m", message])?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scratch repository on `main` holding a single empty commit.
    struct Sandbox {
        dir: tempfile::TempDir,
    }

    impl Sandbox {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let setup: [&[&str]; 4] = [
                &["init", "-q", "-b", "main"],
                &["config", "user.name", "harness"],
                &["config", "user.email", "harness@localhost"],
                &["commit", "-q", "--allow-empty", "-m", "seed"],
            ];
            for args in setup {
                run_git(dir.path(), args).unwrap();
            }
            Self { dir }
        }

        fn path(&self) -> &Path {
            self.dir.path()
        }

        fn last_subject(&self) -> String {
            run_git(self.path(), &["log", "-1", "--format=%s"])
                .unwrap()
                .trim()
                .to_string()
        }
    }

    #[test]
    fn current_branch_reads_checked_out_branch() {
        let repo = Sandbox::new();
        assert_eq!(current_branch(repo.path()), "main");
    }

    #[test]
    fn current_branch_empty_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(current_branch(dir.path()), "");
    }

    #[test]
    fn ensure_branch_switches() {
        let repo = Sandbox::new();
        ensure_branch(repo.path(), "autofix/onboarding-loop").unwrap();
        assert_eq!(current_branch(repo.path()), "autofix/onboarding-loop");
        // Idempotent on an existing branch.
        ensure_branch(repo.path(), "autofix/onboarding-loop").unwrap();
    }

    #[test]
    fn commit_if_dirty_only_commits_changes() {
        let repo = Sandbox::new();
        assert!(!commit_if_dirty(repo.path(), "nothing").unwrap());
        assert_eq!(repo.last_subject(), "seed");

        std::fs::write(repo.path().join("report.md"), "# report\n").unwrap();
        assert!(commit_if_dirty(repo.path(), "chore: onboarding loop").unwrap());
        assert_eq!(repo.last_subject(), "chore: onboarding loop");
        assert!(!commit_if_dirty(repo.path(), "again").unwrap());
    }

    #[test]
    fn commit_if_dirty_fails_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        let err = commit_if_dirty(dir.path(), "msg").unwrap_err();
        assert!(matches!(err, HarnessError::GitError(_)));
    }
}
