//! Target binary builders.
//!
//! The loop rebuilds the CLI under test before every run so scenarios always
//! drive the working tree's code.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, instrument};

use crate::artifacts::bin_dir;
use crate::domain::{HarnessError, Result};

// ---------------------------------------------------------------------------
// Builder trait
// ---------------------------------------------------------------------------

/// Produces the binary the onboarding scenario runs against.
#[async_trait]
pub trait TargetBuilder: Send + Sync {
    /// Build the target for `repo_root` and return the binary's absolute path.
    async fn build(&self, repo_root: &Path) -> Result<PathBuf>;
}

// ---------------------------------------------------------------------------
// go build
// ---------------------------------------------------------------------------

/// `go build -o <repo>/.docs/onboarding-loop/bin/<output> <package>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoBuildTarget {
    pub package: String,
    pub output_name: String,
}

impl Default for GoBuildTarget {
    fn default() -> Self {
        Self {
            package: "./cmd/agentcli".to_string(),
            output_name: "agentcli-loop".to_string(),
        }
    }
}

#[async_trait]
impl TargetBuilder for GoBuildTarget {
    #[instrument(skip(self), fields(package = %self.package))]
    async fn build(&self, repo_root: &Path) -> Result<PathBuf> {
        let repo_root = if repo_root.is_absolute() {
            repo_root.to_path_buf()
        } else {
            std::env::current_dir()?.join(repo_root)
        };
        let bin_dir = bin_dir(&repo_root);
        tokio::fs::create_dir_all(&bin_dir).await?;
        let bin_path = bin_dir.join(&self.output_name);

        let output = Command::new("go")
            .arg("build")
            .arg("-o")
            .arg(&bin_path)
            .arg(&self.package)
            .current_dir(&repo_root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| HarnessError::Build(format!("failed to run go: {e}")))?;

        if !output.status.success() {
            return Err(HarnessError::Build(format!(
                "go build {} failed:\n{}{}",
                self.package,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        info!(event = "build.finished", bin = %bin_path.display());
        Ok(bin_path)
    }
}

// ---------------------------------------------------------------------------
// Prebuilt
// ---------------------------------------------------------------------------

/// An existing binary used as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrebuiltTarget {
    pub path: PathBuf,
}

impl PrebuiltTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TargetBuilder for PrebuiltTarget {
    async fn build(&self, repo_root: &Path) -> Result<PathBuf> {
        let path = if self.path.is_absolute() {
            self.path.clone()
        } else {
            repo_root.join(&self.path)
        };
        if !path.exists() {
            return Err(HarnessError::Build(format!(
                "prebuilt target not found: {}",
                path.display()
            )));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prebuilt_target_resolves_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tool"), "#!/bin/sh\n").unwrap();
        let path = PrebuiltTarget::new("tool").build(dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("tool"));
    }

    #[tokio::test]
    async fn test_prebuilt_target_missing_is_build_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PrebuiltTarget::new("absent").build(dir.path()).await.unwrap_err();
        assert!(matches!(err, HarnessError::Build(_)));
        assert_eq!(err.kind(), crate::domain::ErrorKind::Execution);
    }

    #[tokio::test]
    async fn test_go_build_fails_without_package() {
        let dir = tempfile::tempdir().unwrap();
        let err = GoBuildTarget::default().build(dir.path()).await.unwrap_err();
        assert!(matches!(err, HarnessError::Build(_)));
    }

    #[test]
    fn test_go_build_target_default() {
        let target = GoBuildTarget::default();
        assert_eq!(target.package, "./cmd/agentcli");
        assert_eq!(target.output_name, "agentcli-loop");
    }
}
