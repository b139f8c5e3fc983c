//! Point-in-time CPU time snapshots.

use std::collections::HashMap;

use tracing::{trace, warn};

use crate::error::SamplerResult;
use crate::source::ThreadSource;
use crate::thread::{ThreadDescriptor, ThreadId};

/// Cumulative CPU time of one thread at a monotonic instant.
///
/// `total_time_nanos >= user_time_nanos`; the difference is system time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuTimeSample {
    pub thread_id: ThreadId,
    pub thread_name: String,
    pub timestamp_nanos: u64,
    pub user_time_nanos: u64,
    pub total_time_nanos: u64,
}

impl CpuTimeSample {
    pub fn system_time_nanos(&self) -> u64 {
        self.total_time_nanos.saturating_sub(self.user_time_nanos)
    }
}

/// Snapshot every live thread accepted by `selector`.
///
/// Threads that exit between enumeration and the time read are skipped,
/// as are threads whose counters cannot be read for any other reason.
/// Only a failure to enumerate threads fails the whole batch.
pub fn capture_all<F>(
    source: &dyn ThreadSource,
    selector: F,
) -> SamplerResult<HashMap<ThreadId, CpuTimeSample>>
where
    F: Fn(&ThreadDescriptor) -> bool,
{
    let threads = source.list_threads()?;
    let mut samples = HashMap::new();

    for thread in threads.into_iter().filter(|t| selector(t)) {
        let timestamp_nanos = source.monotonic_nanos();
        match source.read_cpu_time(thread.id) {
            Ok(time) => {
                samples.insert(
                    thread.id,
                    CpuTimeSample {
                        thread_id: thread.id,
                        thread_name: thread.name,
                        timestamp_nanos,
                        user_time_nanos: time.user_nanos,
                        total_time_nanos: time.total_nanos.max(time.user_nanos),
                    },
                );
            }
            Err(e) if e.is_vanished() => {
                trace!(thread_id = %thread.id, "thread exited before sampling");
            }
            Err(e) => {
                warn!(thread_id = %thread.id, error = %e, "skipping thread, cpu time unreadable");
            }
        }
    }

    Ok(samples)
}
