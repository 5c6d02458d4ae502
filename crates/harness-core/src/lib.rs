//! Harness Core Library
//!
//! Drives a CLI binary through a scripted onboarding scenario, scores the
//! outcome, optionally applies fixes and iterates, and persists every run
//! under `.docs/onboarding-loop/`.

pub mod artifacts;
pub mod build;
pub mod classic;
pub mod clean;
pub mod committee;
pub mod compare;
pub mod config;
pub mod controller;
pub mod detector;
pub mod docs_check;
pub mod doctor;
pub mod domain;
pub mod fixer;
pub mod git;
pub mod judge;
pub mod obs;
pub mod process;
pub mod regression;
pub mod replay;
pub mod reporter;
pub mod review;
pub mod roles;
pub mod scenario;
pub mod session;
pub mod telemetry;

pub use domain::{
    codes, CommitteeMeta, ErrorKind, Finding, HarnessError, JudgeScore, Result, RoleExecution,
    RunResult, Scenario, ScenarioResult, Step, StepResult, SCHEMA_VERSION,
};

pub use config::{
    ExecutionLimits, LoopConfig, LoopMode, LoopProfile, ProfileSet, RoleConfig, RoleSpec,
    DEFAULT_THRESHOLD,
};

pub use build::{GoBuildTarget, PrebuiltTarget, TargetBuilder};
pub use controller::{run_loop, LoopController};
pub use fixer::{apply_fixes, Fixer};
pub use session::LoopSession;

pub use detector::detect_findings;
pub use docs_check::check_onboarding_install_readiness;
pub use judge::judge;
pub use scenario::{default_onboarding_scenario, run_scenario};

pub use roles::{CommitteeRoles, RoleName, RoleStrategy};

pub use clean::clean_compare_reports;
pub use compare::{compare_runs, render_compare_markdown, write_compare_output, CompareFormat, CompareReport};
pub use doctor::{loop_doctor, render_doctor_markdown, DoctorReport};
pub use regression::{
    build_behavior_snapshot, check_regression, compare_behavior_snapshot, BehaviorSnapshot,
    RegressionBaseline, RegressionDrift, RegressionReport,
};
pub use replay::{replay_iteration, ReplayReport};
pub use reporter::{render_run_report_md, write_reports, ReportPaths};
pub use review::{load_review_data, ReviewData};
pub use telemetry::init_tracing;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
