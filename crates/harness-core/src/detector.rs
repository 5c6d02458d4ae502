//! Finding detector: scenario outcome → typed findings.
//!
//! Only the first failing step is inspected, mirroring the runner's
//! fail-fast policy.

use crate::domain::finding::{SEVERITY_HIGH, SEVERITY_MEDIUM};
use crate::domain::{codes, Finding, ScenarioResult};

/// Derive findings from a scenario result.
pub fn detect_findings(result: &ScenarioResult) -> Vec<Finding> {
    let mut findings = Vec::new();
    if result.ok {
        return findings;
    }
    let Some(step) = result.first_failure() else {
        return findings;
    };

    let tail = step.combined_tail.to_lowercase();
    findings.push(Finding::new(
        codes::STEP_FAILED,
        SEVERITY_HIGH,
        format!("scenario step failed: {}", step.name),
        &step.name,
    ));
    if tail.contains("fmt:check") && tail.contains("exit status 1") {
        findings.push(Finding::new(
            codes::GENERATED_GO_NOT_FORMATTED,
            SEVERITY_HIGH,
            "generated go file is not gofmt-clean",
            &step.name,
        ));
    }
    if tail.contains("failed to run task") && tail.contains("exit status") {
        findings.push(Finding::new(
            codes::COUNTER_INTUITIVE_ABORT,
            SEVERITY_MEDIUM,
            "flow aborts without clear user-oriented guidance",
            &step.name,
        ));
    }
    findings
}
