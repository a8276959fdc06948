//! Error types for change-gate.
//!
//! This module defines all errors that can occur during operation. Only
//! errors that abort the gate live here; per-check failures are recorded as
//! [`CheckOutcome`](crate::core::check::CheckOutcome) values instead.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code for a gate with at least one failing check.
pub const EXIT_CHECK_FAILURE: i32 = 1;
/// Exit code when the base or head revision cannot be resolved.
pub const EXIT_REVISION: i32 = 2;
/// Exit code when the wall-clock budget ran out.
pub const EXIT_TIMEOUT: i32 = 3;

/// All possible errors in change-gate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Configuration errors
    // =========================================================================
    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// Path where config was expected.
        path: PathBuf,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        /// Description of the parse error.
        message: String,
        /// Optional source error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {field} - {message}")]
    ConfigInvalid {
        /// Field name that is invalid.
        field: String,
        /// Description of why it's invalid.
        message: String,
    },

    /// Malformed `--check` argument.
    #[error("Invalid check definition '{spec}': {message}")]
    InvalidCheckSpec {
        /// The argument as given.
        spec: String,
        /// What is wrong with it.
        message: String,
    },

    /// Malformed command-line flag value.
    #[error("Invalid value for {flag}: {message}")]
    InvalidArgument {
        /// The flag as spelled on the command line.
        flag: String,
        /// What is wrong with the value.
        message: String,
    },

    // =========================================================================
    // Git errors
    // =========================================================================
    /// Not in a Git repository.
    #[error("Not in a Git repository")]
    NotGitRepo,

    /// A base or head revision does not resolve to a commit.
    #[error("Cannot resolve revision '{revision}': {message}")]
    RevisionResolution {
        /// The revision as given.
        revision: String,
        /// Git's explanation.
        message: String,
    },

    /// Git operation failed.
    #[error("Git operation failed: {operation} - {message}")]
    GitOperation {
        /// Name of the operation that failed.
        operation: String,
        /// Error message.
        message: String,
    },

    // =========================================================================
    // I/O errors
    // =========================================================================
    /// File I/O error.
    #[error("I/O error: {message}")]
    Io {
        /// Description of what failed.
        message: String,
        /// Source error.
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Internal errors
    // =========================================================================
    /// Internal error (should never happen).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Creates a new configuration parse error with source.
    pub fn config_parse_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new invalid configuration error.
    pub fn config_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a new invalid flag value error.
    pub fn invalid_argument(flag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            flag: flag.into(),
            message: message.into(),
        }
    }

    /// Creates a new I/O error with context.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Creates a new Git operation error.
    pub fn git(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GitOperation {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a new revision resolution error.
    pub fn revision(revision: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RevisionResolution {
            revision: revision.into(),
            message: message.into(),
        }
    }

    /// Returns an exit code appropriate for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::RevisionResolution { .. } => EXIT_REVISION,
            Self::InvalidCheckSpec { .. } | Self::InvalidArgument { .. } => 64, // EX_USAGE
            Self::ConfigNotFound { .. } | Self::ConfigParse { .. } | Self::ConfigInvalid { .. } => {
                78
            }, // EX_CONFIG
            Self::NotGitRepo | Self::GitOperation { .. } => 65, // EX_DATAERR
            Self::Io { .. } | Self::Internal { .. } => 1,
        }
    }
}
