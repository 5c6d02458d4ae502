//! Per-invocation loop state shared by the committee and classic orchestrators.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::artifacts::{final_report_path, write_json};
use crate::config::LoopConfig;
use crate::detector::detect_findings;
use crate::docs_check::check_onboarding_install_readiness;
use crate::domain::{Finding, Result, RunResult, Scenario, ScenarioResult};
use crate::fixer::Fixer;
use crate::scenario::run_scenario;

/// Everything one loop run needs, assembled once by the controller.
#[derive(Debug, Clone)]
pub struct LoopSession {
    /// Normalized configuration.
    pub config: LoopConfig,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Scenario replayed on every observation.
    pub scenario: Scenario,
    pub fixer: Fixer,
}

impl LoopSession {
    pub fn new(config: LoopConfig, run_id: impl Into<String>, scenario: Scenario) -> Self {
        Self {
            config,
            run_id: run_id.into(),
            started_at: Utc::now(),
            scenario,
            fixer: Fixer::default(),
        }
    }

    pub fn with_fixer(mut self, fixer: Fixer) -> Self {
        self.fixer = fixer;
        self
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.config.repo_root
    }

    /// Run the scenario once and collect scenario plus documentation findings.
    pub async fn observe(&self) -> Result<(ScenarioResult, Vec<Finding>)> {
        let result = run_scenario(&self.scenario, &self.config.limits).await?;
        let mut findings = detect_findings(&result);
        findings.extend(check_onboarding_install_readiness(self.repo_root()));
        Ok((result, findings))
    }

    /// Persist `runs/<run_id>/final-report.json`.
    pub fn write_final_report(&self, result: &RunResult) -> Result<()> {
        write_json(&final_report_path(self.repo_root(), &self.run_id), result)
    }
}
