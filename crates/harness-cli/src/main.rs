//! Onboarding Harness - loop CLI
//!
//! The `harness` command drives a generated CLI through the onboarding
//! scenario, judges it and optionally fixes and commits.
//!
//! ## Commands
//!
//! - `run` / `judge`: Run the loop without fixing
//! - `autofix`: Run the loop with fixes and an auto-commit
//! - `profile <name>`: Run a named profile; `profiles` lists them
//! - `regression`: Run a profile and diff against its behavior baseline
//! - `replay`, `compare`: Inspect recorded runs
//! - `doctor`, `review`, `clean`: Maintenance

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use harness_core::{
    check_regression, clean_compare_reports, compare_runs, load_review_data, loop_doctor,
    render_doctor_markdown, replay_iteration, write_compare_output, CompareFormat, ErrorKind,
    ExecutionLimits, HarnessError, LoopConfig, LoopController, LoopMode, PrebuiltTarget,
    ProfileSet, RunResult,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, Level};

const EXIT_EXECUTION: u8 = 1;
const EXIT_USAGE: u8 = 2;
const EXIT_CONTRACT: u8 = 3;
const EXIT_FILE_IO: u8 = 4;

#[derive(Parser)]
#[command(name = "harness")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Onboarding harness loop", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the loop and report the judge verdict
    Run(RunArgs),

    /// Same as `run`
    Judge(RunArgs),

    /// Run the loop with fixes enabled and commit the result
    Autofix(RunArgs),

    /// Run a named loop profile
    Profile {
        /// Profile name (see `harness profiles`)
        name: String,

        #[command(flatten)]
        loop_args: LoopArgs,
    },

    /// List builtin and repo-configured profiles
    Profiles {
        #[arg(long, default_value = ".")]
        repo_root: PathBuf,
    },

    /// Run a profile and compare its behavior with the stored baseline
    Regression {
        /// Profile to run
        #[arg(long, default_value = "quality")]
        profile: String,

        /// Baseline file (default: testdata/regression/loop-<profile>.behavior-baseline.json)
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Record this run as the new baseline instead of comparing
        #[arg(long)]
        write_baseline: bool,

        #[command(flatten)]
        loop_args: LoopArgs,
    },

    /// Re-run the scenario recorded for one iteration
    Replay {
        #[arg(long, default_value = ".")]
        repo_root: PathBuf,

        #[arg(long)]
        run_id: String,

        /// Iteration number (1-based)
        #[arg(long = "iter")]
        iteration: u32,

        #[arg(long, default_value_t = 0.0)]
        threshold: f64,

        /// Per-step timeout in seconds
        #[arg(long, value_name = "SECS")]
        step_timeout: Option<u64>,
    },

    /// Compare two runs' final reports
    Compare {
        #[arg(long, default_value = ".")]
        repo_root: PathBuf,

        #[arg(long)]
        run_a: String,

        #[arg(long)]
        run_b: String,

        /// Output format: json or md
        #[arg(long, default_value = "json")]
        format: String,

        /// Output path
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Check onboarding docs and replay readiness
    Doctor {
        #[arg(long, default_value = ".")]
        repo_root: PathBuf,

        /// Print Markdown instead of JSON
        #[arg(long)]
        markdown: bool,
    },

    /// Show a condensed view of the latest run
    Review {
        #[arg(long, default_value = ".")]
        repo_root: PathBuf,
    },

    /// Prune old compare reports
    Clean {
        #[arg(long, default_value = ".")]
        repo_root: PathBuf,

        /// Number of newest compare reports to keep
        #[arg(long, default_value_t = harness_core::clean::DEFAULT_KEEP_COMPARE)]
        keep_compare: usize,
    },
}

#[derive(Args, Debug, Clone)]
struct LoopArgs {
    /// Repository under test
    #[arg(long, default_value = ".")]
    repo_root: PathBuf,

    /// Pass threshold (default 9.0)
    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long)]
    max_iterations: Option<u32>,

    /// Branch used for auto-commits
    #[arg(long)]
    branch: Option<String>,

    /// Role configuration JSON (relative to the repo root)
    #[arg(long)]
    role_config: Option<PathBuf>,

    /// Keep per-iteration role contexts (enables replay)
    #[arg(long)]
    verbose_artifacts: bool,

    #[arg(long, conflicts_with = "verbose_artifacts")]
    no_verbose_artifacts: bool,

    /// Per-step timeout in seconds
    #[arg(long, value_name = "SECS")]
    step_timeout: Option<u64>,

    /// Per-role-invocation timeout in seconds
    #[arg(long, value_name = "SECS")]
    role_timeout: Option<u64>,

    /// Use an existing binary instead of `go build`
    #[arg(long)]
    target_bin: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Orchestration mode: committee or classic
    #[arg(long, default_value = "committee")]
    mode: LoopMode,

    #[arg(long, default_value_t = 0)]
    seed: i64,

    #[arg(long)]
    budget: Option<u32>,

    #[command(flatten)]
    loop_args: LoopArgs,
}

impl LoopArgs {
    /// Overlay explicit flags on `config`.
    fn apply(&self, mut config: LoopConfig) -> LoopConfig {
        config.repo_root = self.repo_root.clone();
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(max_iterations) = self.max_iterations {
            config.max_iterations = max_iterations;
        }
        if let Some(branch) = &self.branch {
            config.branch = branch.clone();
        }
        if let Some(role_config) = &self.role_config {
            config.role_config_path = Some(harness_core::config::resolve_repo_path(
                &self.repo_root,
                role_config,
            ));
        }
        if self.verbose_artifacts {
            config.verbose_artifacts = true;
        }
        if self.no_verbose_artifacts {
            config.verbose_artifacts = false;
        }
        let mut limits = ExecutionLimits::unlimited();
        if let Some(secs) = self.step_timeout {
            limits = limits.with_step_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.role_timeout {
            limits = limits.with_role_timeout(Duration::from_secs(secs));
        }
        config.limits = limits;
        config
    }

    fn controller(&self) -> LoopController {
        match &self.target_bin {
            Some(path) => LoopController::new().with_builder(PrebuiltTarget::new(path)),
            None => LoopController::new(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    harness_core::init_tracing(cli.json, level);

    match dispatch(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

async fn dispatch(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Run(args) | Commands::Judge(args) => cmd_run(&args, false).await,
        Commands::Autofix(args) => cmd_run(&args, true).await,
        Commands::Profile { name, loop_args } => cmd_profile(&name, &loop_args).await,
        Commands::Profiles { repo_root } => cmd_profiles(&repo_root),
        Commands::Regression {
            profile,
            baseline,
            write_baseline,
            loop_args,
        } => cmd_regression(&profile, baseline.as_deref(), write_baseline, &loop_args).await,
        Commands::Replay {
            repo_root,
            run_id,
            iteration,
            threshold,
            step_timeout,
        } => cmd_replay(&repo_root, &run_id, iteration, threshold, step_timeout).await,
        Commands::Compare {
            repo_root,
            run_a,
            run_b,
            format,
            out,
        } => cmd_compare(&repo_root, &run_a, &run_b, &format, out.as_deref()),
        Commands::Doctor {
            repo_root,
            markdown,
        } => cmd_doctor(&repo_root, markdown),
        Commands::Review { repo_root } => cmd_review(&repo_root),
        Commands::Clean {
            repo_root,
            keep_compare,
        } => cmd_clean(&repo_root, keep_compare),
    }
}

/// Exit code for a failed command, from the first `HarnessError` in the chain.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    let kind = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<HarnessError>())
        .map(HarnessError::kind);
    match kind {
        Some(ErrorKind::Usage) => EXIT_USAGE,
        Some(ErrorKind::ContractValidation) => EXIT_CONTRACT,
        Some(ErrorKind::FileIo) => EXIT_FILE_IO,
        Some(ErrorKind::Execution) | None => EXIT_EXECUTION,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the run and turn a failed verdict into exit code 1.
fn report_run(result: &RunResult) -> Result<ExitCode> {
    print_json(result)?;
    if result.judge.pass {
        return Ok(ExitCode::SUCCESS);
    }
    eprintln!(
        "loop judge failed threshold: score={:.2} threshold={:.2}",
        result.judge.score, result.judge.threshold
    );
    eprintln!("hint: review findings and rerun with adjusted strategy or threshold");
    Ok(ExitCode::from(EXIT_EXECUTION))
}

async fn cmd_run(args: &RunArgs, autofix: bool) -> Result<ExitCode> {
    let mut config = LoopConfig::new(&args.loop_args.repo_root);
    config.mode = args.mode;
    config.seed = args.seed;
    config.budget = args.budget.unwrap_or(0);
    config.auto_fix = autofix;
    config.auto_commit = autofix;
    let config = args.loop_args.apply(config);

    info!(mode = %config.mode, autofix, "Running onboarding loop");
    let result = args
        .loop_args
        .controller()
        .run(config)
        .await
        .context("loop run failed")?;
    report_run(&result)
}

fn profile_config(name: &str, loop_args: &LoopArgs) -> Result<LoopConfig> {
    let profiles = ProfileSet::load(&loop_args.repo_root).context("read loop profiles")?;
    let profile = profiles
        .require(name)
        .context("use 'harness profiles' to inspect profiles")?;
    Ok(loop_args.apply(LoopConfig::new(&loop_args.repo_root).with_profile(profile)))
}

async fn cmd_profile(name: &str, loop_args: &LoopArgs) -> Result<ExitCode> {
    let config = profile_config(name, loop_args)?;
    info!(profile = name, mode = %config.mode, "Running loop profile");
    let result = loop_args
        .controller()
        .run(config)
        .await
        .context("loop profile run failed")?;
    report_run(&result)
}

#[derive(Serialize)]
struct ProfilesOutput<'a> {
    repo_root: &'a Path,
    profiles: Vec<String>,
}

fn cmd_profiles(repo_root: &Path) -> Result<ExitCode> {
    let profiles = ProfileSet::load(repo_root).context("read loop profiles")?;
    let lines = profiles
        .iter()
        .map(|(name, profile)| profile.format_line(name))
        .collect();
    print_json(&ProfilesOutput {
        repo_root,
        profiles: lines,
    })?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_regression(
    profile: &str,
    baseline: Option<&Path>,
    write_baseline: bool,
    loop_args: &LoopArgs,
) -> Result<ExitCode> {
    let config = profile_config(profile, loop_args)?;
    let result = loop_args
        .controller()
        .run(config)
        .await
        .context("loop regression run failed")?;

    let baseline_path =
        harness_core::regression::resolve_baseline_path(&loop_args.repo_root, profile, baseline);
    let report = check_regression(profile, &baseline_path, write_baseline, &result)
        .context("write regression baseline")?;
    print_json(&report)?;

    if let Some(error) = &report.error {
        eprintln!("{error}");
        eprintln!(
            "hint: create baseline with: harness regression --repo-root {} --profile {} --write-baseline",
            loop_args.repo_root.display(),
            profile
        );
        return Ok(ExitCode::from(EXIT_CONTRACT));
    }
    if !report.pass {
        eprintln!("loop behavior drift detected ({} drift(s))", report.drift_count);
        eprintln!("hint: run with --write-baseline only after intentional behavior changes");
        return Ok(ExitCode::from(EXIT_CONTRACT));
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_replay(
    repo_root: &Path,
    run_id: &str,
    iteration: u32,
    threshold: f64,
    step_timeout: Option<u64>,
) -> Result<ExitCode> {
    let limits = match step_timeout {
        Some(secs) => ExecutionLimits::unlimited().with_step_timeout(Duration::from_secs(secs)),
        None => ExecutionLimits::unlimited(),
    };
    let report = replay_iteration(repo_root, run_id, iteration, threshold, &limits)
        .await
        .context("replay failed")?;
    print_json(&report)?;
    if !report.replay_judge.pass {
        eprintln!("replay judge failed");
        return Ok(ExitCode::from(EXIT_EXECUTION));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_compare(
    repo_root: &Path,
    run_a: &str,
    run_b: &str,
    format: &str,
    out: Option<&Path>,
) -> Result<ExitCode> {
    let format: CompareFormat = format.parse()?;
    let report = compare_runs(repo_root, run_a, run_b).context("compare runs failed")?;
    match write_compare_output(repo_root, &report, format, out)
        .context("write compare report")?
    {
        Some(path) => println!("Wrote compare report to {}", path.display()),
        None => print_json(&report)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_doctor(repo_root: &Path, markdown: bool) -> Result<ExitCode> {
    let report = loop_doctor(repo_root);
    if markdown {
        print!("{}", render_doctor_markdown(&report));
    } else {
        print_json(&report)?;
    }
    if !report.lean_ready {
        eprintln!("loop doctor found readiness issues");
        eprintln!("hint: fix findings before running the quality profile");
        return Ok(ExitCode::from(EXIT_CONTRACT));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_review(repo_root: &Path) -> Result<ExitCode> {
    let review = load_review_data(repo_root).context("load latest run summary")?;
    print_json(&review)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_clean(repo_root: &Path, keep_compare: usize) -> Result<ExitCode> {
    let removed = clean_compare_reports(repo_root, keep_compare)?;
    println!("loop clean completed ({removed} compare report(s) removed)");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "harness",
            "run",
            "--mode",
            "classic",
            "--threshold",
            "8.5",
            "--max-iterations",
            "2",
            "--verbose-artifacts",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.mode, LoopMode::Classic);
        let config = args.loop_args.apply(LoopConfig::new("."));
        assert_eq!(config.threshold, 8.5);
        assert_eq!(config.max_iterations, 2);
        assert!(config.verbose_artifacts);
    }

    #[test]
    fn test_verbose_artifact_flags_conflict() {
        let err = Cli::try_parse_from([
            "harness",
            "profile",
            "quality",
            "--verbose-artifacts",
            "--no-verbose-artifacts",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_no_verbose_artifacts_overrides_profile() {
        let cli = Cli::try_parse_from(["harness", "profile", "quality", "--no-verbose-artifacts"])
            .unwrap();
        let Commands::Profile { name, loop_args } = cli.command else {
            panic!("expected profile");
        };
        let config = profile_config(&name, &loop_args).unwrap();
        assert!(!config.verbose_artifacts);
        assert_eq!(config.max_iterations, 1);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["harness", "run", "--mode", "swarm"]).is_err());
    }

    #[test]
    fn test_exit_code_mapping() {
        let usage = anyhow::Error::new(HarnessError::Usage("x".to_string()));
        assert_eq!(exit_code_for(&usage), EXIT_USAGE);

        let contract = anyhow::Error::new(HarnessError::ContractValidation("x".to_string()))
            .context("loop run failed");
        assert_eq!(exit_code_for(&contract), EXIT_CONTRACT);

        let io = anyhow::Error::new(HarnessError::Io(std::io::Error::other("disk")));
        assert_eq!(exit_code_for(&io), EXIT_FILE_IO);

        assert_eq!(exit_code_for(&anyhow::anyhow!("plain")), EXIT_EXECUTION);
    }

    #[test]
    fn test_unknown_profile_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = LoopArgs {
            repo_root: dir.path().to_path_buf(),
            threshold: None,
            max_iterations: None,
            branch: None,
            role_config: None,
            verbose_artifacts: false,
            no_verbose_artifacts: false,
            step_timeout: None,
            role_timeout: None,
            target_bin: None,
        };
        let err = profile_config("nope", &args).unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_USAGE);
    }
}
