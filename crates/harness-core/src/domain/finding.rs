//! Findings: coded, severity-tagged problems detected during a run.

use serde::{Deserialize, Serialize};

/// Finding codes with dedicated scoring weights or fixes.
///
/// The vocabulary is closed-ish: unknown codes are accepted everywhere, scored
/// with the default penalty and never auto-fixed.
pub mod codes {
    pub const STEP_FAILED: &str = "step_failed";
    pub const GENERATED_GO_NOT_FORMATTED: &str = "generated_go_not_formatted";
    pub const COUNTER_INTUITIVE_ABORT: &str = "counter_intuitive_abort";
    pub const ONBOARDING_INSTALL_MISSING: &str = "onboarding_install_missing";
    pub const ONBOARDING_INSTALL_VERIFY_MISSING: &str = "onboarding_install_verify_missing";
}

pub const SEVERITY_HIGH: &str = "high";
pub const SEVERITY_MEDIUM: &str = "medium";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub code: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub source: String,
}

impl Finding {
    pub fn new(
        code: impl Into<String>,
        severity: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            severity: severity.into(),
            message: message.into(),
            source: source.into(),
        }
    }
}

/// Codes of `findings`, in order.
pub fn finding_codes(findings: &[Finding]) -> Vec<String> {
    findings.iter().map(|f| f.code.clone()).collect()
}
