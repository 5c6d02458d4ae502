//! Loop controller: the top-level entry point for one harness run.
//!
//! Normalizes the config, builds the target, dispatches to the committee or
//! classic orchestrator, writes reports and optionally commits the result.

use std::path::Path;

use chrono::Utc;
use tracing::Instrument;

use crate::artifacts::TIMESTAMP_FORMAT;
use crate::build::{GoBuildTarget, TargetBuilder};
use crate::classic::run_classic;
use crate::committee::run_committee;
use crate::config::{LoopConfig, LoopMode, RoleConfig};
use crate::domain::{Result, RunResult, Scenario};
use crate::fixer::Fixer;
use crate::git::{commit_if_dirty, ensure_branch};
use crate::obs;
use crate::reporter::write_reports;
use crate::roles::CommitteeRoles;
use crate::scenario::default_onboarding_scenario;
use crate::session::LoopSession;

type ScenarioFactory = Box<dyn Fn(&Path) -> Scenario + Send + Sync>;

/// Runs the loop with injectable collaborators.
///
/// The default builds `./cmd/agentcli` with `go build`, drives the default
/// onboarding scenario and uses the default fix catalogue. Tests swap in a
/// prebuilt target and a scripted scenario.
pub struct LoopController {
    builder: Box<dyn TargetBuilder>,
    scenario: ScenarioFactory,
    fixer: Fixer,
}

impl Default for LoopController {
    fn default() -> Self {
        Self {
            builder: Box::new(GoBuildTarget::default()),
            scenario: Box::new(default_onboarding_scenario),
            fixer: Fixer::default(),
        }
    }
}

impl LoopController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(mut self, builder: impl TargetBuilder + 'static) -> Self {
        self.builder = Box::new(builder);
        self
    }

    /// Scenario to run against the built binary.
    pub fn with_scenario(mut self, scenario: impl Fn(&Path) -> Scenario + Send + Sync + 'static) -> Self {
        self.scenario = Box::new(scenario);
        self
    }

    pub fn with_fixer(mut self, fixer: Fixer) -> Self {
        self.fixer = fixer;
        self
    }

    /// Execute one loop run.
    pub async fn run(&self, config: LoopConfig) -> Result<RunResult> {
        let config = config.normalized();
        let started_at = Utc::now();
        let run_id = started_at.format(TIMESTAMP_FORMAT).to_string();
        let span = obs::loop_span(&run_id, config.mode.as_str());
        self.run_inner(config, run_id, started_at)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        config: LoopConfig,
        run_id: String,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<RunResult> {
        obs::emit_loop_started(
            &run_id,
            config.mode.as_str(),
            config.max_iterations,
            config.threshold,
        );

        // Role config problems surface before the build.
        let roles = match config.mode {
            LoopMode::Committee => Some(CommitteeRoles::resolve(&RoleConfig::load(
                config.role_config_path.as_deref(),
            )?)),
            LoopMode::Classic => None,
        };

        let bin = self.builder.build(&config.repo_root).await?;
        let session = LoopSession::new(config, run_id, (self.scenario)(&bin))
            .with_fixer(self.fixer.clone())
            .with_started_at(started_at);

        let mut result = match &roles {
            Some(roles) => run_committee(&session, roles).await?,
            None => run_classic(&session).await?,
        };

        write_reports(session.repo_root(), &result)?;

        let config = &session.config;
        if config.auto_commit {
            ensure_branch(&config.repo_root, &config.branch)?;
            let message = format!(
                "chore: onboarding loop {} score {:.2}",
                result.mode, result.judge.score
            );
            if commit_if_dirty(&config.repo_root, &message)? {
                result.branch = config.branch.clone();
            }
        }

        obs::emit_loop_finished(
            &session.run_id,
            result.iterations,
            result.judge.score,
            result.judge.pass,
        );
        Ok(result)
    }
}

/// Run the loop with the default collaborators.
pub async fn run_loop(config: LoopConfig) -> Result<RunResult> {
    LoopController::default().run(config).await
}
