//! Gate runner: executes checks against a change set.
//!
//! Checks run one after another in declaration order. A failing check never
//! stops the run; every check gets an outcome so the report is complete.
//! The only thing that cuts a run short is the wall-clock budget.

use crate::core::changeset::ChangeSet;
use crate::core::check::{CheckDefinition, CheckMode, CheckOutcome, FailureKind};
use crate::core::error::{EXIT_CHECK_FAILURE, EXIT_TIMEOUT};
use crate::core::executor::{CommandOutput, ExecuteOptions, Executor};
use crate::core::git::{DiffRange, GitRepo};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Which file set the gate is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateMode {
    /// Files changed between base and head (pull-request style).
    #[default]
    ScopedToChanges,
    /// Every tracked file (push-to-main style).
    FullTree,
}

impl GateMode {
    /// Returns the name used in configuration and on the command line.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ScopedToChanges => "scoped-to-changes",
            Self::FullTree => "full-tree",
        }
    }
}

impl std::fmt::Display for GateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for GateMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scoped-to-changes" | "scoped" | "changes" => Ok(Self::ScopedToChanges),
            "full-tree" | "full" => Ok(Self::FullTree),
            _ => Err(format!(
                "Invalid gate mode: {s}. Expected: scoped-to-changes or full-tree"
            )),
        }
    }
}

/// Result of running a single check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the check.
    pub name: String,
    /// Mode the check was defined with.
    pub mode: CheckMode,
    /// Terminal state.
    pub outcome: CheckOutcome,
    /// Why the check failed, for [`CheckOutcome::Failure`].
    pub failure: Option<FailureKind>,
    /// Number of paths handed to the command.
    pub files: usize,
    /// Output from the command (empty when it never ran).
    pub output: CommandOutput,
}

impl CheckResult {
    fn not_run(def: &CheckDefinition, outcome: CheckOutcome) -> Self {
        Self {
            name: def.name.clone(),
            mode: def.mode,
            outcome,
            failure: None,
            files: 0,
            output: CommandOutput::default(),
        }
    }

    /// Returns true if the check counts against the gate.
    #[must_use]
    pub const fn failed(&self) -> bool {
        matches!(self.outcome, CheckOutcome::Failure | CheckOutcome::TimedOut)
    }
}

/// Aggregate status of a gate run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateStatus {
    /// Every check succeeded or had nothing to check.
    Passed,
    /// At least one check failed.
    Failed,
    /// The wall-clock budget ran out.
    TimedOut,
}

impl GateStatus {
    /// Process exit code for this status.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Passed => 0,
            Self::Failed => EXIT_CHECK_FAILURE,
            Self::TimedOut => EXIT_TIMEOUT,
        }
    }
}

/// Result of running all checks.
#[derive(Debug)]
pub struct GateResult {
    /// Individual check results, in declaration order.
    pub checks: Vec<CheckResult>,
    /// Total duration.
    pub duration: Duration,
}

impl GateResult {
    /// Overall status. A timeout takes precedence over ordinary failures.
    #[must_use]
    pub fn status(&self) -> GateStatus {
        if self.checks.iter().any(|c| c.outcome.is_timeout()) {
            GateStatus::TimedOut
        } else if self
            .checks
            .iter()
            .any(|c| c.outcome == CheckOutcome::Failure)
        {
            GateStatus::Failed
        } else {
            GateStatus::Passed
        }
    }

    /// Returns true if the gate passed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status() == GateStatus::Passed
    }

    /// Returns the outcome recorded for a check.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<CheckOutcome> {
        self.checks
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.outcome)
    }

    /// Returns the number of checks with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: CheckOutcome) -> usize {
        self.checks.iter().filter(|c| c.outcome == outcome).count()
    }

    /// Returns failed and timed-out check results.
    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| c.failed())
    }
}

/// Settings shared by every check in a run.
#[derive(Debug, Clone, Default)]
pub struct GateOptions {
    /// Directory checks run in (the repository root).
    pub cwd: Option<PathBuf>,
    /// Wall-clock budget for the whole gate.
    pub timeout: Option<Duration>,
    /// Maximum paths per invocation of a scoped check.
    pub batch_size: Option<usize>,
    /// Environment exported to every check.
    pub env: Vec<(String, String)>,
    /// Show a spinner and per-check status lines on stderr.
    pub show_progress: bool,
}

/// Runner for executing checks.
#[derive(Debug)]
pub struct GateRunner {
    options: GateOptions,
    executor: Executor,
}

impl GateRunner {
    /// Creates a new runner.
    #[must_use]
    pub fn new(options: GateOptions) -> Self {
        Self {
            options,
            executor: Executor::new(),
        }
    }

    /// Computes the paths that differ between `base` and `head`.
    pub fn compute_change_set(
        repo: &GitRepo,
        base: &str,
        head: &str,
        range: DiffRange,
        diff_filter: &str,
    ) -> crate::Result<ChangeSet> {
        repo.changed_files(base, head, range, diff_filter)
    }

    /// Runs every check in order and aggregates the outcomes.
    pub async fn run_gate(&self, defs: &[CheckDefinition], scope: &ChangeSet) -> GateResult {
        let start = Instant::now();
        let deadline = self.options.timeout.map(|t| start + t);
        let mut results = Vec::with_capacity(defs.len());
        let mut expired = false;

        for def in defs {
            if !expired && deadline.is_some_and(|d| Instant::now() >= d) {
                expired = true;
            }

            let result = if expired {
                CheckResult::not_run(def, CheckOutcome::SkippedTimeout)
            } else {
                self.run_check_within(def, scope, deadline).await
            };

            if result.outcome == CheckOutcome::TimedOut {
                tracing::warn!(check = %def.name, "Gate timeout reached, skipping remaining checks");
                expired = true;
            }

            self.report(&result);
            results.push(result);
        }

        GateResult {
            checks: results,
            duration: start.elapsed(),
        }
    }

    /// Runs a single check against `scope`, bounded by the gate timeout.
    pub async fn run_check(&self, def: &CheckDefinition, scope: &ChangeSet) -> CheckResult {
        let deadline = self.options.timeout.map(|t| Instant::now() + t);
        self.run_check_within(def, scope, deadline).await
    }

    async fn run_check_within(
        &self,
        def: &CheckDefinition,
        scope: &ChangeSet,
        deadline: Option<Instant>,
    ) -> CheckResult {
        let input = match def.mode {
            CheckMode::Full => ChangeSet::empty(),
            CheckMode::Scoped => match def.include_patterns() {
                Ok(patterns) => scope.filter(&patterns),
                Err(e) => {
                    return CheckResult {
                        failure: Some(FailureKind::Invocation {
                            message: e.to_string(),
                        }),
                        ..CheckResult::not_run(def, CheckOutcome::Failure)
                    };
                },
            },
        };

        // Never hand a scoped tool zero paths: most tools read that as
        // "check everything".
        if def.mode == CheckMode::Scoped && input.is_empty() {
            tracing::debug!(check = %def.name, "No matching files, skipping");
            return CheckResult::not_run(def, CheckOutcome::SkippedEmptyInput);
        }

        let pb = self.spinner(&def.name);
        let result = self.invoke(def, &input, deadline).await;
        pb.finish_and_clear();
        result
    }

    async fn invoke(
        &self,
        def: &CheckDefinition,
        input: &ChangeSet,
        deadline: Option<Instant>,
    ) -> CheckResult {
        let batches = match def.mode {
            CheckMode::Full => vec![&[][..]],
            CheckMode::Scoped => input.batches(self.options.batch_size),
        };

        let mut combined = CommandOutput::default();
        let mut outcome = CheckOutcome::Success;
        let mut failure = None;

        for batch in batches {
            let mut options = ExecuteOptions::default().script_name(def.name.clone());
            if let Some(ref cwd) = self.options.cwd {
                options = options.cwd(cwd);
            }
            for (key, value) in &self.options.env {
                options = options.env(key.clone(), value.clone());
            }
            for (key, value) in &def.env {
                options = options.env(key.clone(), value.clone());
            }
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    outcome = CheckOutcome::TimedOut;
                    break;
                }
                options = options.timeout(remaining);
            }

            tracing::debug!(check = %def.name, files = batch.len(), "Running check");
            let output = match self.executor.execute_with_args(&def.run, batch, options).await {
                Ok(output) => output,
                Err(e) => {
                    tracing::warn!(check = %def.name, error = %e, "Could not start check");
                    outcome = CheckOutcome::Failure;
                    failure = Some(FailureKind::Invocation {
                        message: e.to_string(),
                    });
                    break;
                },
            };

            append_output(&mut combined, &output);

            if output.timed_out {
                outcome = CheckOutcome::TimedOut;
                break;
            }
            if output.not_invocable() {
                outcome = CheckOutcome::Failure;
                failure = Some(FailureKind::Invocation {
                    message: format!(
                        "program not found or not executable (exit code {})",
                        output.exit_code
                    ),
                });
                break;
            }
            if !output.success() {
                outcome = CheckOutcome::Failure;
                failure = Some(FailureKind::ExitCode {
                    code: output.exit_code,
                });
                break;
            }
        }

        tracing::debug!(check = %def.name, outcome = %outcome, "Check finished");

        CheckResult {
            name: def.name.clone(),
            mode: def.mode,
            outcome,
            failure,
            files: input.len(),
            output: combined,
        }
    }

    fn spinner(&self, name: &str) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .ok()
                .unwrap_or_else(ProgressStyle::default_spinner),
        );
        pb.set_message(format!("Running {name}..."));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    fn report(&self, result: &CheckResult) {
        if !self.options.show_progress {
            return;
        }

        let name = &result.name;
        match result.outcome {
            CheckOutcome::Success => eprintln!("{} {name}", style("✓").green()),
            CheckOutcome::Failure => eprintln!("{} {name}", style("✗").red()),
            CheckOutcome::TimedOut => eprintln!("{} {name} (timed out)", style("✗").red()),
            CheckOutcome::SkippedEmptyInput => {
                eprintln!("{} {name} (no changed files)", style("-").dim());
            },
            CheckOutcome::SkippedTimeout => {
                eprintln!("{} {name} (skipped, out of time)", style("-").yellow());
            },
        }
    }
}

fn append_output(into: &mut CommandOutput, from: &CommandOutput) {
    into.stdout.push_str(&from.stdout);
    into.stderr.push_str(&from.stderr);
    into.exit_code = from.exit_code;
    into.timed_out = from.timed_out;
    into.duration += from.duration;
}
