//! Error types
//!
//! [`TxnError`] is returned to callers for bad input and failed explicit
//! writes. Failures inside teardown never propagate; they are collected as
//! [`StepFailure`]s on the [`TeardownReport`](crate::teardown::TeardownReport).
use std::fmt;

use artifact_store::{BufferError, StoreError};
use named_counter::CounterError;
use serde::Serialize;
use thiserror::Error;

/// Errors returned synchronously to the caller
#[derive(Debug, Error)]
pub enum TxnError {
    /// blank label, key or artifact name
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// `start` on a label that is already open
    #[error("transaction `{0}` is already active")]
    DuplicateActive(String),

    /// `end` on a label that is not open
    #[error("transaction `{0}` is not active")]
    NotFound(String),

    /// an explicit artifact write failed
    #[error("artifact write failed ({}): {0}", .0.reason())]
    IoFailure(#[from] StoreError),
}

impl TxnError {
    /// Returns true for caller input problems
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, TxnError::InvalidArgument(_))
    }
}

impl From<CounterError> for TxnError {
    fn from(err: CounterError) -> Self {
        match err {
            CounterError::InvalidArgument => TxnError::InvalidArgument("counter key is empty"),
        }
    }
}

impl From<BufferError> for TxnError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::InvalidArgument => TxnError::InvalidArgument("artifact name is blank"),
            BufferError::NotConfigured => {
                TxnError::InvalidArgument("no artifact destination configured")
            }
            BufferError::Store(err) => TxnError::IoFailure(err),
        }
    }
}

/// Shorthand result alias
pub type Result<T> = std::result::Result<T, TxnError>;

/// Teardown step identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// ending transactions that were still open
    FailInFlight,
    /// computing and stamping the overall outcome
    Finalize,
    /// emergency `Fail` finalize after `Finalize` failed
    FinalizeFallback,
    /// best-effort per-transaction summary
    Summary,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::FailInFlight => "fail in-flight",
            Step::Finalize => "finalize",
            Step::FinalizeFallback => "finalize fallback",
            Step::Summary => "summary",
        })
    }
}

/// An unexpected failure inside one teardown step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    /// the step that failed
    pub step: Step,
    /// what went wrong
    pub message: String,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.message)
    }
}
