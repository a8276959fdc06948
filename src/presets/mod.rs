//! Configuration presets for common project types.
//!
//! Presets provide sensible default check lists for different tech stacks.
//! Formatters and linters are scoped to changed files; test suites run
//! against the full tree because a change anywhere can break them.

use crate::core::check::{CheckDefinition, CheckMode};

/// Available preset names.
pub mod names {
    /// Python projects (pre-commit, pytest with coverage).
    pub const PYTHON: &str = "python";
    /// Node.js/TypeScript projects (prettier, eslint, npm test).
    pub const NODE: &str = "node";
    /// Rust projects (rustfmt, clippy, cargo test).
    pub const RUST: &str = "rust";
    /// Go projects (gofmt, go vet, go test).
    pub const GO: &str = "go";
}

/// Minimum line coverage the Python preset enforces.
pub const PYTHON_COVERAGE_THRESHOLD: u8 = 80;

/// Returns a list of available preset names.
#[must_use]
pub const fn available() -> &'static [&'static str] {
    &[names::PYTHON, names::NODE, names::RUST, names::GO]
}

/// Returns a description for a preset.
#[must_use]
pub fn description(name: &str) -> &'static str {
    match name {
        names::PYTHON => "Python: pre-commit on changed files, pytest with coverage threshold",
        names::NODE => "Node.js/TypeScript: prettier and eslint on changed files, npm test",
        names::RUST => "Rust: rustfmt on changed files, clippy and cargo test",
        names::GO => "Go: gofmt on changed files, go vet and go test",
        _ => "Unknown preset",
    }
}

/// Returns the checks for a preset, in the order they should run.
///
/// Unknown names yield an empty list.
#[must_use]
pub fn checks(name: &str) -> Vec<CheckDefinition> {
    match name {
        names::PYTHON => python(),
        names::NODE => node(),
        names::RUST => rust(),
        names::GO => go(),
        _ => Vec::new(),
    }
}

fn python() -> Vec<CheckDefinition> {
    vec![
        CheckDefinition::new(
            "pre-commit",
            "pre-commit run --show-diff-on-failure --color=always --files",
            CheckMode::Scoped,
        )
        .description("Run pre-commit hooks on changed files"),
        CheckDefinition::new(
            "coverage",
            format!("pytest --cov --cov-report=term --cov-fail-under={PYTHON_COVERAGE_THRESHOLD}"),
            CheckMode::Full,
        )
        .description("Run the test suite with a coverage threshold"),
    ]
}

fn node() -> Vec<CheckDefinition> {
    vec![
        CheckDefinition::new("format", "npx prettier --check", CheckMode::Scoped)
            .description("Check formatting of changed files")
            .include("*.js")
            .include("*.jsx")
            .include("*.ts")
            .include("*.tsx")
            .include("*.json")
            .include("*.md"),
        CheckDefinition::new("lint", "npx eslint", CheckMode::Scoped)
            .description("Lint changed sources")
            .include("*.js")
            .include("*.jsx")
            .include("*.ts")
            .include("*.tsx"),
        CheckDefinition::new("test", "npm test", CheckMode::Full).description("Run the test suite"),
    ]
}

fn rust() -> Vec<CheckDefinition> {
    vec![
        CheckDefinition::new("fmt", "rustfmt --check --edition 2021", CheckMode::Scoped)
            .description("Check formatting of changed files")
            .include("*.rs"),
        CheckDefinition::new(
            "clippy",
            "cargo clippy --all-targets --all-features -- -D warnings",
            CheckMode::Full,
        )
        .description("Run Clippy lints"),
        CheckDefinition::new("test", "cargo test", CheckMode::Full).description("Run the test suite"),
    ]
}

fn go() -> Vec<CheckDefinition> {
    vec![
        CheckDefinition::new(
            "fmt",
            r#"gofmt_clean() { test -z "$(gofmt -l "$@")"; }; gofmt_clean"#,
            CheckMode::Scoped,
        )
        .description("Check formatting of changed files")
        .include("*.go"),
        CheckDefinition::new("vet", "go vet ./...", CheckMode::Full).description("Run go vet"),
        CheckDefinition::new("test", "go test ./...", CheckMode::Full).description("Run the test suite"),
    ]
}
