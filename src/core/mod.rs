//! Core functionality for change-gate.
//!
//! This module contains the main components:
//! - [`changeset`]: The set of paths a run is scoped to
//! - [`check`]: Check definitions and outcomes
//! - [`git`]: Revision resolution and change detection
//! - [`executor`]: Process spawning with timeouts
//! - [`runner`]: The gate itself
//! - [`error`]: Error types and result handling

pub mod changeset;
pub mod check;
pub mod error;
pub mod executor;
pub mod git;
pub mod runner;
