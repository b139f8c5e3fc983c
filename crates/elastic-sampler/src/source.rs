//! The thread enumeration collaborator.

use crate::error::SamplerResult;
use crate::thread::{CpuTime, ThreadDescriptor, ThreadId};

/// Host view of the threads of this process and their CPU counters.
///
/// `read_cpu_time` returns [`SamplerError::Vanished`] when the thread has
/// exited since it was listed; callers treat that as a skip.
///
/// [`SamplerError::Vanished`]: crate::SamplerError::Vanished
pub trait ThreadSource: Send + Sync {
    /// Enumerate the currently live threads.
    fn list_threads(&self) -> SamplerResult<Vec<ThreadDescriptor>>;

    /// Read the cumulative CPU time of one thread.
    fn read_cpu_time(&self, id: ThreadId) -> SamplerResult<CpuTime>;

    /// Monotonic clock reading in nanoseconds.
    fn monotonic_nanos(&self) -> u64;
}
