//! Role vocabulary: `RoleName`, `RoleStrategy`, the `RoleOutput` contract and
//! the typed planner/fixer/judger payloads.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::RoleSpec;
use crate::domain::{Finding, HarnessError, Result, ScenarioResult, SCHEMA_VERSION};

pub const BUILTIN_LABEL: &str = "builtin";
pub const EXTERNAL_LABEL: &str = "external";

/// The three committee roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleName {
    Planner,
    Fixer,
    Judger,
}

impl RoleName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Planner => "planner",
            RoleName::Fixer => "fixer",
            RoleName::Judger => "judger",
        }
    }

    /// Artifact file `<role>-<suffix>` inside an iteration directory.
    pub fn artifact_file(&self, suffix: &str) -> String {
        format!("{}-{suffix}", self.as_str())
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a role is executed, plus the strategy label recorded for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleStrategy {
    Builtin { label: String },
    External { label: String, command: String },
}

impl RoleStrategy {
    pub fn builtin() -> Self {
        RoleStrategy::Builtin {
            label: BUILTIN_LABEL.to_string(),
        }
    }

    pub fn external(command: impl Into<String>) -> Self {
        RoleStrategy::External {
            label: EXTERNAL_LABEL.to_string(),
            command: command.into(),
        }
    }

    /// Resolve a configured spec.
    ///
    /// A non-blank command always runs externally and a blank one runs the
    /// builtin. The configured strategy only names the label.
    pub fn resolve(spec: &RoleSpec) -> Self {
        let label = spec.strategy_label();
        let command = spec.command.trim();
        if command.is_empty() {
            RoleStrategy::Builtin { label }
        } else {
            RoleStrategy::External {
                label,
                command: command.to_string(),
            }
        }
    }

    pub fn label(&self) -> &str {
        match self {
            RoleStrategy::Builtin { label } | RoleStrategy::External { label, .. } => label,
        }
    }

    pub fn command(&self) -> &str {
        match self {
            RoleStrategy::Builtin { .. } => "",
            RoleStrategy::External { command, .. } => command,
        }
    }
}

/// Resolved strategies for one committee run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitteeRoles {
    pub planner: RoleStrategy,
    pub fixer: RoleStrategy,
    pub judger: RoleStrategy,
}

impl CommitteeRoles {
    pub fn builtin() -> Self {
        Self {
            planner: RoleStrategy::builtin(),
            fixer: RoleStrategy::builtin(),
            judger: RoleStrategy::builtin(),
        }
    }

    pub fn resolve(config: &crate::config::RoleConfig) -> Self {
        Self {
            planner: RoleStrategy::resolve(&config.planner),
            fixer: RoleStrategy::resolve(&config.fixer),
            judger: RoleStrategy::resolve(&config.judger),
        }
    }
}

/// A payload produced by a role, decoded and checked in two separate steps.
pub trait RoleOutput: Serialize + DeserializeOwned + Clone + std::fmt::Debug + Send {
    const ROLE: RoleName;

    fn schema_version_mut(&mut self) -> &mut String;

    /// Fill defaults: a missing schema version becomes the current one.
    fn normalize(&mut self) {
        let version = self.schema_version_mut();
        if version.trim().is_empty() {
            *version = SCHEMA_VERSION.to_string();
        }
    }

    /// Reject payloads that break the role contract.
    fn validate(&self) -> Result<()>;

    /// Fixes this payload reports as applied.
    fn applied(&self) -> &[String] {
        &[]
    }
}

fn check_schema_version(role: RoleName, version: &str) -> Result<()> {
    if version != SCHEMA_VERSION {
        return Err(HarnessError::ContractValidation(format!(
            "invalid {role} schema_version: {version:?}"
        )));
    }
    Ok(())
}

fn require_text(value: &str, message: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(HarnessError::ContractValidation(message.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlannerOutput {
    #[serde(default)]
    pub schema_version: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub fix_targets: Vec<String>,
}

impl PlannerOutput {
    /// Builtin plan: target every finding code.
    pub fn builtin(findings: &[Finding]) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            summary: "builtin planner".to_string(),
            fix_targets: crate::domain::finding_codes(findings),
        }
    }
}

impl RoleOutput for PlannerOutput {
    const ROLE: RoleName = RoleName::Planner;

    fn schema_version_mut(&mut self) -> &mut String {
        &mut self.schema_version
    }

    fn validate(&self) -> Result<()> {
        check_schema_version(Self::ROLE, &self.schema_version)?;
        require_text(&self.summary, "planner summary is required")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FixerOutput {
    #[serde(default)]
    pub schema_version: String,
    #[serde(default)]
    pub applied: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl FixerOutput {
    pub fn builtin(applied: Vec<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            applied,
            notes: "builtin fixer".to_string(),
        }
    }
}

impl RoleOutput for FixerOutput {
    const ROLE: RoleName = RoleName::Fixer;

    fn schema_version_mut(&mut self) -> &mut String {
        &mut self.schema_version
    }

    fn validate(&self) -> Result<()> {
        check_schema_version(Self::ROLE, &self.schema_version)?;
        require_text(&self.notes, "fixer notes are required")
    }

    fn applied(&self) -> &[String] {
        &self.applied
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JudgerOutput {
    #[serde(default)]
    pub schema_version: String,
    #[serde(default)]
    pub extra_findings: Vec<Finding>,
    #[serde(default)]
    pub notes: String,
}

impl JudgerOutput {
    pub fn builtin() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            extra_findings: Vec::new(),
            notes: "builtin judger".to_string(),
        }
    }
}

impl RoleOutput for JudgerOutput {
    const ROLE: RoleName = RoleName::Judger;

    fn schema_version_mut(&mut self) -> &mut String {
        &mut self.schema_version
    }

    fn validate(&self) -> Result<()> {
        check_schema_version(Self::ROLE, &self.schema_version)?;
        require_text(&self.notes, "judger notes are required")
    }
}

/// Input handed to every role for one iteration. Also the replay source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoleContext {
    pub run_id: String,
    pub mode: String,
    pub iteration: u32,
    pub threshold: f64,
    pub budget: u32,
    pub seed: i64,
    pub scenario: ScenarioResult,
    pub findings: Vec<Finding>,
    pub fixes_so_far: Vec<String>,
    pub repo_root: PathBuf,
    pub artifact_dir: PathBuf,
}

/// Fixer input: the iteration context plus the planner's plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixerInput {
    pub context: RoleContext,
    pub plan: PlannerOutput,
}
