//! Check definitions and their outcomes.

use crate::core::error::{Error, Result};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// How a check relates to the change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckMode {
    /// Receives the change set as positional arguments.
    #[default]
    Scoped,
    /// Ignores the change set and runs against the whole tree.
    Full,
}

impl CheckMode {
    /// Returns the name used in configuration and on the command line.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Scoped => "scoped",
            Self::Full => "full",
        }
    }
}

impl std::fmt::Display for CheckMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for CheckMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scoped" => Ok(Self::Scoped),
            "full" => Ok(Self::Full),
            _ => Err(format!("Invalid check mode: {s}. Expected: scoped or full")),
        }
    }
}

/// A named external command the gate runs.
///
/// Commands must be safe to re-run: the gate never retries, but operators
/// re-trigger whole runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckDefinition {
    /// Name shown in the report.
    pub name: String,
    /// Shell command to run.
    pub run: String,
    /// Whether the check receives the change set.
    #[serde(default)]
    pub mode: CheckMode,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Glob patterns narrowing the change set for this check.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    /// Environment variables to set.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl CheckDefinition {
    /// Creates a check with no description, filters or extra environment.
    pub fn new(name: impl Into<String>, run: impl Into<String>, mode: CheckMode) -> Self {
        Self {
            name: name.into(),
            run: run.into(),
            mode,
            description: String::new(),
            include: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds an include pattern.
    #[must_use]
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    /// Parses a `name[:scoped|:full]=command` argument.
    pub fn parse_spec(spec: &str) -> Result<Self> {
        static SPEC: OnceLock<Option<Regex>> = OnceLock::new();
        let re = SPEC
            .get_or_init(|| {
                Regex::new(r"^(?P<name>[A-Za-z0-9_.-]+)(?::(?P<mode>[A-Za-z]+))?=(?P<run>.*)$").ok()
            })
            .as_ref()
            .ok_or_else(|| Error::Internal {
                message: "check spec pattern failed to compile".to_string(),
            })?;

        let invalid = |message: &str| Error::InvalidCheckSpec {
            spec: spec.to_string(),
            message: message.to_string(),
        };

        let caps = re
            .captures(spec)
            .ok_or_else(|| invalid("expected name[:scoped|:full]=command"))?;

        let mode = match caps.name("mode") {
            Some(m) => m.as_str().parse().map_err(|e: String| invalid(&e))?,
            None => CheckMode::default(),
        };

        let run = caps.name("run").map_or("", |m| m.as_str()).trim();
        if run.is_empty() {
            return Err(invalid("command is empty"));
        }

        let name = caps.name("name").map_or("", |m| m.as_str());
        Ok(Self::new(name, run, mode))
    }

    /// Compiles the include patterns.
    pub fn include_patterns(&self) -> Result<Vec<Pattern>> {
        self.include
            .iter()
            .map(|raw| {
                Pattern::new(raw).map_err(|e| {
                    Error::config_invalid(
                        format!("checks.{}.include", self.name),
                        format!("Invalid pattern '{raw}': {e}"),
                    )
                })
            })
            .collect()
    }

    /// Returns the program the command starts with, if it is a plain word.
    ///
    /// Used to warn about tools missing from PATH; compound shell commands
    /// yield `None`.
    #[must_use]
    pub fn program(&self) -> Option<&str> {
        let first = self.run.split_whitespace().next()?;
        let plain = first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
        plain.then_some(first)
    }
}

/// Terminal state of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckOutcome {
    /// The command exited with status 0.
    Success,
    /// The command exited non-zero or could not be invoked.
    Failure,
    /// Scoped check with nothing to look at; the command was not run.
    SkippedEmptyInput,
    /// The command was killed when the wall-clock budget ran out.
    TimedOut,
    /// The budget ran out before the check started.
    SkippedTimeout,
}

impl CheckOutcome {
    /// Returns the name used in reports.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::SkippedEmptyInput => "skipped-empty-input",
            Self::TimedOut => "timed-out",
            Self::SkippedTimeout => "skipped-timeout",
        }
    }

    /// Returns true for outcomes caused by the wall-clock budget.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut | Self::SkippedTimeout)
    }
}

impl std::fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Why a check ended in [`CheckOutcome::Failure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FailureKind {
    /// The tool ran and exited non-zero.
    ExitCode {
        /// The exit code.
        code: i32,
    },
    /// The tool could not be started.
    Invocation {
        /// What went wrong.
        message: String,
    },
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExitCode { code } => write!(f, "exit code {code}"),
            Self::Invocation { message } => write!(f, "could not invoke: {message}"),
        }
    }
}
