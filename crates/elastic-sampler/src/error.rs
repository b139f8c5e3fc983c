//! Sampler error types.

use thiserror::Error;

use crate::thread::ThreadId;

/// Result type alias for sampling operations.
pub type SamplerResult<T> = Result<T, SamplerError>;

/// Errors raised while reading thread CPU counters.
#[derive(Debug, Error)]
pub enum SamplerError {
    /// The thread exited between enumeration and the time read.
    #[error("thread {0} vanished")]
    Vanished(ThreadId),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {path}: {reason}")]
    Parse { path: String, reason: String },
}

impl SamplerError {
    /// Whether the error only means the thread is gone.
    pub fn is_vanished(&self) -> bool {
        matches!(self, SamplerError::Vanished(_))
    }
}

/// A sample pair that cannot produce a valid interval.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadIntervalError {
    #[error("thread {thread_id}: zero-length sampling interval")]
    EmptyInterval { thread_id: ThreadId },

    #[error("thread {thread_id}: {counter} went backwards")]
    Regression {
        thread_id: ThreadId,
        counter: &'static str,
    },
}
