//! Error types for package manager operations.
//!
//! Errors are categorized so callers can tell a cancelled or timed-out
//! operation apart from a broken manager spec or a genuine command failure.
//! "Manager not available" is deliberately not an error: availability checks
//! return `Ok(false)` instead.

use std::fmt;
use thiserror::Error;

/// Why a [`Context`](crate::exec::Context) stopped an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// The context was cancelled explicitly
    Cancelled,
    /// The context deadline passed
    DeadlineExceeded,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "context cancelled"),
            Self::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

/// Categories of package manager errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Cancellation or timeout (callers may abort a whole batch)
    Context,
    /// The manager binary could not be started
    NotAvailable,
    /// Package or manager not known
    NotFound,
    /// The manager does not offer this capability
    Unsupported,
    /// Broken manager spec, config, or package reference
    Config,
    /// Output could not be parsed
    Parse,
    /// The external command failed
    CommandFailed,
    /// Local IO failure
    Io,
}

impl ErrorCategory {
    /// Whether the error is a cancellation/timeout.
    pub fn is_context(&self) -> bool {
        matches!(self, Self::Context)
    }

    /// Whether the error was raised before any external process ran.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Config | Self::NotFound)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Context => "Operation cancelled or timed out",
            Self::NotAvailable => "Package manager not available",
            Self::NotFound => "Not found",
            Self::Unsupported => "Not supported by this manager",
            Self::Config => "Invalid configuration",
            Self::Parse => "Unexpected command output",
            Self::CommandFailed => "Command failed",
            Self::Io => "IO failure",
        }
    }
}

/// Errors that can occur while driving a package manager.
#[derive(Debug, Error)]
pub enum Error {
    /// Cancellation or deadline
    #[error("{0}")]
    Context(ContextError),

    /// The process could not be spawned
    #[error("failed to execute {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully
    #[error("{command} failed{}: {output}", exit_suffix(.code))]
    CommandFailed {
        /// Rendered command line
        command: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Combined stdout/stderr, trimmed
        output: String,
    },

    /// Output could not be parsed with the configured strategy
    #[error("failed to parse output with strategy {strategy}: {message}")]
    Parse {
        /// Parse strategy in use
        strategy: String,
        /// What went wrong
        message: String,
    },

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid regular expression in a spec
    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Manager name not present in the registry
    #[error("unknown package manager: {0}")]
    UnknownManager(String),

    /// No explicit manager and no default configured
    #[error("no package manager specified and no default configured")]
    NoManager,

    /// Malformed package reference
    #[error("invalid package spec {input:?}: {reason}")]
    InvalidSpec {
        /// Input as typed by the user
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Malformed manager spec or config value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Capability not offered by a manager
    #[error("{manager} does not support {capability}")]
    Unsupported {
        /// Manager name
        manager: String,
        /// Missing capability (e.g. "upgrade_all")
        capability: String,
    },

    /// Package not found by the manager
    #[error("package not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Context(_) => ErrorCategory::Context,
            Error::Spawn { .. } => ErrorCategory::NotAvailable,
            Error::CommandFailed { .. } => ErrorCategory::CommandFailed,
            Error::Parse { .. } | Error::Json(_) => ErrorCategory::Parse,
            Error::Regex(_)
            | Error::NoManager
            | Error::InvalidSpec { .. }
            | Error::InvalidConfig(_) => ErrorCategory::Config,
            Error::UnknownManager(_) | Error::NotFound(_) => ErrorCategory::NotFound,
            Error::Unsupported { .. } => ErrorCategory::Unsupported,
            Error::Io(_) => ErrorCategory::Io,
        }
    }

    /// Whether this is a cancellation or timeout.
    pub fn is_context(&self) -> bool {
        self.category().is_context()
    }

    pub(crate) fn parse(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            strategy: strategy.into(),
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(manager: &str, capability: &str) -> Self {
        Error::Unsupported {
            manager: manager.to_string(),
            capability: capability.to_string(),
        }
    }
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (exit {c})")).unwrap_or_default()
}

/// Result type for package manager operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_category() {
        let err = Error::Context(ContextError::DeadlineExceeded);
        assert!(err.is_context());
        assert_eq!(err.to_string(), "context deadline exceeded");
    }

    #[test]
    fn test_validation_categories() {
        assert!(Error::NoManager.category().is_validation());
        assert!(Error::UnknownManager("zypper".into()).category().is_validation());
        assert!(!Error::unsupported("cargo", "upgrade_all").category().is_validation());
    }

    #[test]
    fn test_command_failed_display() {
        let err = Error::CommandFailed {
            command: "brew install foo".into(),
            code: Some(1),
            output: "Error: No available formula".into(),
        };
        assert_eq!(
            err.to_string(),
            "brew install foo failed (exit 1): Error: No available formula"
        );
        assert!(!err.is_context());
    }

    #[test]
    fn test_unsupported_names_capability() {
        let err = Error::unsupported("cargo", "upgrade_all");
        assert_eq!(err.to_string(), "cargo does not support upgrade_all");
        assert_eq!(err.category(), ErrorCategory::Unsupported);
    }
}
