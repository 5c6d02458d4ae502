//! Static onboarding documentation checks.
//!
//! Inspects the onboarding prompt and README for an explicit install step and
//! an install verification step.

use std::path::Path;

use crate::domain::finding::{SEVERITY_HIGH, SEVERITY_MEDIUM};
use crate::domain::{codes, Finding};

pub const README_PATH: &str = "README.md";
pub const ONBOARDING_PROMPT_PATH: &str = "prompts/agentcli-onboarding.prompt.md";

/// Findings for missing install or install-verification guidance.
///
/// Unreadable files count as empty.
pub fn check_onboarding_install_readiness(repo_root: &Path) -> Vec<Finding> {
    let readme = read_lower(&repo_root.join(README_PATH));
    let prompt = read_lower(&repo_root.join(ONBOARDING_PROMPT_PATH));

    let mut findings = Vec::new();
    if !contains_install_step(&prompt) {
        findings.push(Finding::new(
            codes::ONBOARDING_INSTALL_MISSING,
            SEVERITY_HIGH,
            "onboarding prompt is missing explicit agentcli install step",
            ONBOARDING_PROMPT_PATH,
        ));
    }
    if !contains_install_verification_step(&prompt) {
        findings.push(Finding::new(
            codes::ONBOARDING_INSTALL_VERIFY_MISSING,
            SEVERITY_MEDIUM,
            "onboarding prompt is missing install verification step",
            ONBOARDING_PROMPT_PATH,
        ));
    }
    if readme.contains("ai prompt starter") && !contains_install_step(&readme) {
        findings.push(Finding::new(
            codes::ONBOARDING_INSTALL_MISSING,
            SEVERITY_HIGH,
            "README AI prompt starter is missing explicit install step",
            README_PATH,
        ));
    }
    findings
}

fn read_lower(path: &Path) -> String {
    std::fs::read_to_string(path)
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

fn contains_install_step(text: &str) -> bool {
    text.contains("go install github.com/gh-xj/agentcli-go/cmd/agentcli@")
        || (text.contains("brew") && text.contains("install agentcli"))
}

fn contains_install_verification_step(text: &str) -> bool {
    text.contains("which agentcli")
        || (text.contains("agentcli --version") && text.contains("agentcli --help"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn test_detects_missing_install() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), README_PATH, "AI Prompt Starter");
        write(root.path(), ONBOARDING_PROMPT_PATH, "no install here");

        let findings = check_onboarding_install_readiness(root.path());
        let found: Vec<&str> = findings.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(
            found,
            vec![
                codes::ONBOARDING_INSTALL_MISSING,
                codes::ONBOARDING_INSTALL_VERIFY_MISSING,
                codes::ONBOARDING_INSTALL_MISSING,
            ]
        );
        assert_eq!(findings[2].source, README_PATH);
    }

    #[test]
    fn test_ready_docs_have_no_findings() {
        let root = tempfile::tempdir().unwrap();
        write(
            root.path(),
            ONBOARDING_PROMPT_PATH,
            "Run `go install github.com/gh-xj/agentcli-go/cmd/agentcli@latest`, then `which agentcli`.",
        );
        assert!(check_onboarding_install_readiness(root.path()).is_empty());
    }

    #[test]
    fn test_brew_install_with_version_and_help_is_ready() {
        let root = tempfile::tempdir().unwrap();
        write(
            root.path(),
            ONBOARDING_PROMPT_PATH,
            "brew tap gh-xj/tap && brew install agentcli\nagentcli --version\nagentcli --help",
        );
        assert!(check_onboarding_install_readiness(root.path()).is_empty());
    }
}
