//! Gate reports.

use crate::core::changeset::ChangeSet;
use crate::core::check::{CheckMode, CheckOutcome, FailureKind};
use crate::core::runner::{GateMode, GateResult, GateStatus};
use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;

/// Lines of output shown per failed check in the text report.
const OUTPUT_TAIL_LINES: usize = 20;

/// Serializable summary of a gate run.
#[derive(Debug, Serialize)]
pub struct GateReport<'a> {
    pub status: GateStatus,
    pub exit_code: i32,
    pub mode: GateMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<&'a str>,
    pub head: &'a str,
    pub changed_files: &'a ChangeSet,
    pub checks: Vec<CheckReport<'a>>,
    pub duration_ms: u128,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CheckReport<'a> {
    pub name: &'a str,
    pub mode: CheckMode,
    pub outcome: CheckOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<&'a FailureKind>,
    pub files: usize,
    pub duration_ms: u128,
}

impl<'a> GateReport<'a> {
    pub fn new(
        result: &'a GateResult,
        mode: GateMode,
        base: Option<&'a str>,
        head: &'a str,
        changed_files: &'a ChangeSet,
    ) -> Self {
        let status = result.status();
        Self {
            status,
            exit_code: status.exit_code(),
            mode,
            base,
            head,
            changed_files,
            checks: result
                .checks
                .iter()
                .map(|c| CheckReport {
                    name: &c.name,
                    mode: c.mode,
                    outcome: c.outcome,
                    failure: c.failure.as_ref(),
                    files: c.files,
                    duration_ms: c.output.duration.as_millis(),
                })
                .collect(),
            duration_ms: result.duration.as_millis(),
            finished_at: Utc::now(),
        }
    }
}

/// Prints the per-check table to stdout and the summary to stderr.
pub fn print_text(result: &GateResult) {
    let width = result
        .checks
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(0);

    for check in &result.checks {
        let outcome = match check.outcome {
            CheckOutcome::Success => style(check.outcome.name()).green(),
            CheckOutcome::Failure | CheckOutcome::TimedOut => style(check.outcome.name()).red(),
            CheckOutcome::SkippedTimeout => style(check.outcome.name()).yellow(),
            CheckOutcome::SkippedEmptyInput => style(check.outcome.name()).dim(),
        };
        match check.failure {
            Some(ref failure) => println!(
                "{:<width$}  {:<6}  {outcome} ({failure})",
                check.name,
                check.mode.name()
            ),
            None => println!("{:<width$}  {:<6}  {outcome}", check.name, check.mode.name()),
        }
    }

    eprintln!();
    match result.status() {
        GateStatus::Passed => eprintln!(
            "{} Gate passed ({} succeeded, {} skipped) in {:?}",
            style("✓").green().bold(),
            result.count(CheckOutcome::Success),
            result.count(CheckOutcome::SkippedEmptyInput),
            result.duration
        ),
        GateStatus::Failed => eprintln!(
            "{} Gate failed: {} check(s) failed",
            style("✗").red().bold(),
            result.count(CheckOutcome::Failure)
        ),
        GateStatus::TimedOut => eprintln!(
            "{} Gate timed out: {} check(s) not run",
            style("✗").red().bold(),
            result.count(CheckOutcome::SkippedTimeout)
        ),
    }

    for check in result.failed_checks() {
        let output = check.output.combined_output();
        if output.trim().is_empty() {
            continue;
        }
        eprintln!();
        eprintln!("  {} {}", style("Failed:").red(), check.name);
        let lines: Vec<_> = output.lines().collect();
        let skip = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
        for line in &lines[skip..] {
            eprintln!("    {line}");
        }
    }
}

/// Prints the report as JSON on stdout.
pub fn print_json(report: &GateReport<'_>) -> crate::Result<()> {
    let json = serde_json::to_string_pretty(report).map_err(|e| crate::Error::Internal {
        message: format!("Failed to serialize report: {e}"),
    })?;
    println!("{json}");
    Ok(())
}
