//! Loop configuration: run settings, execution limits, role specs and profiles.
//!
//! Every value here is assembled once per invocation (defaults merged with an
//! optional file) and threaded through the call graph explicitly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{HarnessError, Result};
use crate::roles::{BUILTIN_LABEL, EXTERNAL_LABEL};

pub const DEFAULT_THRESHOLD: f64 = 9.0;
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;
pub const DEFAULT_BRANCH: &str = "autofix/onboarding-loop";
pub const DEFAULT_BUDGET: u32 = 1;

/// Repo-relative location of the optional profile overrides file.
pub const PROFILES_CONFIG_FILE: &str = "configs/loop-profiles.json";

/// Which orchestrator drives the loop.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    #[default]
    Committee,
    Classic,
}

impl LoopMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::Committee => "committee",
            LoopMode::Classic => "classic",
        }
    }
}

impl std::fmt::Display for LoopMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoopMode {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "committee" => Ok(LoopMode::Committee),
            "classic" => Ok(LoopMode::Classic),
            other => Err(HarnessError::Usage(format!("unknown loop mode: {other}"))),
        }
    }
}

/// Optional deadlines for subprocesses. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub step_timeout: Option<Duration>,
    pub role_timeout: Option<Duration>,
}

impl ExecutionLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn with_role_timeout(mut self, timeout: Duration) -> Self {
        self.role_timeout = Some(timeout);
        self
    }
}

/// Settings for one loop controller invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoopConfig {
    pub repo_root: PathBuf,
    pub threshold: f64,
    pub max_iterations: u32,
    pub auto_fix: bool,
    pub auto_commit: bool,
    pub branch: String,
    pub mode: LoopMode,
    pub role_config_path: Option<PathBuf>,
    pub seed: i64,
    pub budget: u32,
    pub verbose_artifacts: bool,
    #[serde(default)]
    pub limits: ExecutionLimits,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            threshold: 0.0,
            max_iterations: 0,
            auto_fix: false,
            auto_commit: false,
            branch: String::new(),
            mode: LoopMode::Committee,
            role_config_path: None,
            seed: 0,
            budget: 0,
            verbose_artifacts: false,
            limits: ExecutionLimits::default(),
        }
    }
}

impl LoopConfig {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            ..Default::default()
        }
    }

    /// Fill unset values with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.threshold <= 0.0 {
            self.threshold = DEFAULT_THRESHOLD;
        }
        if self.max_iterations == 0 {
            self.max_iterations = DEFAULT_MAX_ITERATIONS;
        }
        if self.branch.trim().is_empty() {
            self.branch = DEFAULT_BRANCH.to_string();
        }
        if self.budget == 0 {
            self.budget = DEFAULT_BUDGET;
        }
        self
    }

    /// Apply a named profile's values on top of this config.
    pub fn with_profile(mut self, profile: &LoopProfile) -> Self {
        self.mode = profile.mode;
        if profile.threshold > 0.0 {
            self.threshold = profile.threshold;
        }
        if profile.max_iterations > 0 {
            self.max_iterations = profile.max_iterations;
        }
        if profile.budget > 0 {
            self.budget = profile.budget;
        }
        if !profile.role_config.trim().is_empty() {
            self.role_config_path = Some(resolve_repo_path(&self.repo_root, &profile.role_config));
        }
        self.verbose_artifacts = profile.verbose_artifacts;
        self
    }
}

/// Resolve `path` against `repo_root` unless it is already absolute.
pub fn resolve_repo_path(repo_root: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        repo_root.join(path)
    }
}

// ---------------------------------------------------------------------------
// Role configuration
// ---------------------------------------------------------------------------

/// How one role should run. An empty spec means the builtin role.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub strategy: String,
    #[serde(default)]
    pub command: String,
}

impl RoleSpec {
    pub fn external(command: impl Into<String>) -> Self {
        Self {
            strategy: EXTERNAL_LABEL.to_string(),
            command: command.into(),
        }
    }

    /// The configured strategy, or `external`/`builtin` depending on
    /// whether a command is set.
    pub fn strategy_label(&self) -> String {
        let strategy = self.strategy.trim();
        if !strategy.is_empty() {
            strategy.to_string()
        } else if self.command.trim().is_empty() {
            BUILTIN_LABEL.to_string()
        } else {
            EXTERNAL_LABEL.to_string()
        }
    }
}

/// Role specs for the three committee roles.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleConfig {
    #[serde(default)]
    pub planner: RoleSpec,
    #[serde(default)]
    pub fixer: RoleSpec,
    #[serde(default)]
    pub judger: RoleSpec,
}

impl RoleConfig {
    /// Load role specs from `path`, or all-builtin roles when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| HarnessError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| HarnessError::Usage(format!("parse role config {path:?}: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// A named preset of loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoopProfile {
    #[serde(default)]
    pub mode: LoopMode,
    #[serde(default)]
    pub role_config: String,
    #[serde(default)]
    pub max_iterations: u32,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub budget: u32,
    #[serde(default)]
    pub verbose_artifacts: bool,
}

impl LoopProfile {
    /// The builtin `quality` profile.
    pub fn quality() -> Self {
        Self {
            mode: LoopMode::Committee,
            role_config: "configs/skill-quality.roles.json".to_string(),
            max_iterations: 1,
            threshold: 9.0,
            budget: 1,
            verbose_artifacts: true,
        }
    }

    /// One-line human-readable rendering.
    pub fn format_line(&self, name: &str) -> String {
        let role_config = if self.role_config.is_empty() {
            "(builtin)"
        } else {
            self.role_config.as_str()
        };
        format!(
            "{name}: mode={} threshold={:.1} max_iterations={} budget={} role_config={} verbose_artifacts={}",
            self.mode,
            self.threshold,
            self.max_iterations,
            self.budget,
            role_config,
            self.verbose_artifacts
        )
    }
}

/// Builtin profiles merged with `configs/loop-profiles.json` when present.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSet {
    profiles: BTreeMap<String, LoopProfile>,
}

impl Default for ProfileSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProfileSet {
    pub fn builtin() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert("quality".to_string(), LoopProfile::quality());
        Self { profiles }
    }

    /// Builtin profiles overlaid with the repo's profile file, if any.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let mut set = Self::builtin();
        let path = repo_root.join(PROFILES_CONFIG_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(set),
            Err(source) => return Err(HarnessError::ReadFile { path, source }),
        };
        let overrides: BTreeMap<String, LoopProfile> = serde_json::from_str(&raw)
            .map_err(|e| HarnessError::Usage(format!("parse loop profiles {path:?}: {e}")))?;
        set.profiles.extend(overrides);
        Ok(set)
    }

    pub fn get(&self, name: &str) -> Option<&LoopProfile> {
        self.profiles.get(name)
    }

    /// Look up `name`, failing with a usage error when it is unknown.
    pub fn require(&self, name: &str) -> Result<&LoopProfile> {
        self.get(name)
            .ok_or_else(|| HarnessError::Usage(format!("unknown loop profile: {name}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LoopProfile)> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
