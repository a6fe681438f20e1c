use std::fmt;

/// Unified error type for the mastering worker.
#[derive(Debug, Clone)]
pub enum WorkerError {
    /// Invalid input provided by the caller.
    InvalidInput(String),
    /// The local environment could not be prepared (directories, storage).
    Environment(String),
    /// Internal error.
    Internal(String),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            WorkerError::Environment(msg) => write!(f, "environment error: {msg}"),
            WorkerError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for WorkerError {}

/// Result type alias using [`WorkerError`].
pub type WorkerResult<T> = Result<T, WorkerError>;
