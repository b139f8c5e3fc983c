//! Worker lifecycle error types.

use thiserror::Error;

use crate::pool::WorkerId;

/// Result type alias for worker lifecycle requests.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// A start or stop request that did not complete.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("failed to start worker: {0}")]
    Start(String),

    #[error("failed to stop {worker}: {reason}")]
    Stop { worker: WorkerId, reason: String },

    #[error("unknown worker: {0}")]
    UnknownWorker(WorkerId),
}
