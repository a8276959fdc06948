//! # change-gate
//!
//! Change-scoped quality gate for CI.
//!
//! A pull request should only be judged on what it touched. `change-gate`
//! computes the files that changed between a base and a head revision, runs
//! an ordered list of checks against exactly those files, and reduces the
//! outcomes to one status and exit code.
//!
//! ## Features
//!
//! - **Change sets from git**: merge-base or direct diffs, with a configurable
//!   diff filter; full-tree runs use every tracked file
//! - **Scoped and full checks**: scoped checks receive the changed paths as
//!   arguments and are skipped when there are none; full checks always run
//! - **Complete reports**: a failing check never stops the run
//! - **Wall-clock budget**: one timeout for the whole gate, reported separately
//!   from ordinary failures
//!
//! ## Example
//!
//! ```rust,no_run
//! use change_gate::{CheckDefinition, CheckMode, GateOptions, GateRunner, GitRepo};
//! use change_gate::core::git::DiffRange;
//!
//! #[tokio::main]
//! async fn main() -> change_gate::Result<()> {
//!     let repo = GitRepo::discover()?;
//!     let changes =
//!         GateRunner::compute_change_set(&repo, "origin/main", "HEAD", DiffRange::MergeBase, "ACMR")?;
//!
//!     let checks = [
//!         CheckDefinition::new("lint", "ruff check", CheckMode::Scoped),
//!         CheckDefinition::new("coverage", "pytest --cov", CheckMode::Full),
//!     ];
//!
//!     let runner = GateRunner::new(GateOptions::default());
//!     let result = runner.run_gate(&checks, &changes).await;
//!
//!     std::process::exit(result.status().exit_code());
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/change-gate/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cli;
pub mod config;
pub mod core;
pub mod presets;

// Re-export main types for convenience
pub use crate::config::Config;
pub use crate::core::changeset::ChangeSet;
pub use crate::core::check::{CheckDefinition, CheckMode, CheckOutcome, FailureKind};
pub use crate::core::error::{Error, Result};
pub use crate::core::git::GitRepo;
pub use crate::core::runner::{CheckResult, GateMode, GateOptions, GateResult, GateRunner, GateStatus};
