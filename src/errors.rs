//! Error types for step execution and the engine boundary

use serde::{Deserialize, Serialize};

use crate::store::StoreError;
use crate::RunId;

/// Error from a forward or compensating step execution.
///
/// The default policy treats every failure uniformly and retries up to
/// the step's budget; `Fatal` is the classification hook for executors
/// that know a failure cannot succeed on retry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StepError {
    /// Temporary error, subject to the step's retry policy
    Retriable {
        /// Error description
        reason: Box<str>,
    },
    /// Permanent error, bypasses remaining retries
    Fatal {
        /// Error description
        reason: Box<str>,
    },
}

impl StepError {
    /// Build a retriable error
    pub fn retriable(reason: impl Into<Box<str>>) -> Self {
        Self::Retriable {
            reason: reason.into(),
        }
    }

    /// Build a fatal error
    pub fn fatal(reason: impl Into<Box<str>>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }

    /// Check if this error is retriable
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Retriable { .. })
    }

    /// Error description
    pub fn reason(&self) -> &str {
        match self {
            Self::Retriable { reason } | Self::Fatal { reason } => reason,
        }
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retriable { reason } => write!(f, "retriable: {reason}"),
            Self::Fatal { reason } => write!(f, "fatal: {reason}"),
        }
    }
}

impl std::error::Error for StepError {}

/// Error surfaced at the engine boundary.
///
/// Step failures never appear here; they are handled inside the engine
/// (retry or compensate) and reported through the run's terminal status.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Run state could not be persisted or loaded
    #[error("run store error: {0}")]
    Store(#[from] StoreError),
    /// Resume requested for a run the store does not know
    #[error("unknown run: {0}")]
    UnknownRun(RunId),
    /// Resume requested against a definition the run was not started with
    #[error("run {run_id} belongs to definition '{expected}', not '{actual}'")]
    DefinitionMismatch {
        /// The run being resumed
        run_id: RunId,
        /// Definition name recorded on the run
        expected: Box<str>,
        /// Definition name passed to resume
        actual: Box<str>,
    },
}
