//! Core Error Types
//!
//! Defines the error type returned by executor implementations and carried
//! by the actor into `Failed` progress events.

use thiserror::Error;

/// Core error type for index execution.
///
/// `Cancelled` is not a failure: the drain loop treats it as a normal
/// continuation and never reports it to progress listeners.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Cooperative cancellation was observed
    #[error("Index run cancelled")]
    Cancelled,

    /// The index executor failed
    #[error("Executor error: {0}")]
    Executor(String),

    /// A run task ended without returning, e.g. the executor panicked
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for index errors
pub type IndexResult<T> = Result<T, IndexError>;

impl IndexError {
    /// Create an executor error
    pub fn executor(msg: impl Into<String>) -> Self {
        Self::Executor(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns `true` for cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Convert IndexError to a string
impl From<IndexError> for String {
    fn from(err: IndexError) -> String {
        err.to_string()
    }
}
