//! Executor error types.

use std::time::Duration;

use thiserror::Error;

use crate::signer::KeyError;

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Every signature tier failed. Carries the last tier's decoded reason.
    #[error("No compatible signature for {operation}: {reason}")]
    NoCompatibleSignature {
        operation: &'static str,
        reason: String,
    },

    /// Transaction send, confirmation or receipt status failed.
    #[error("Submission failure: {0}")]
    SubmissionFailure(String),

    /// The execution task panicked or was cancelled.
    #[error("Execution unit failed: {0}")]
    ExecutionUnitFailed(String),

    #[error("Execution timed out after {0:?}")]
    ExecutionTimeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
