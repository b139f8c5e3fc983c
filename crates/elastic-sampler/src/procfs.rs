//! Linux thread source backed by `/proc/self/task`.
//!
//! Each task directory carries the thread name in `comm` and the CPU
//! counters in `stat` (fields 14 `utime` and 15 `stime`, in clock ticks).
//! Resolution is one clock tick, typically 10ms.

use std::io;
use std::path::PathBuf;
use std::time::Instant;

use tracing::debug;

use crate::error::{SamplerError, SamplerResult};
use crate::source::ThreadSource;
use crate::thread::{CpuTime, ThreadDescriptor, ThreadId};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Index of `utime` among the fields following the `(comm)` field.
const UTIME_FIELD: usize = 11;
const STIME_FIELD: usize = 12;

/// Reads thread names and CPU counters from procfs.
pub struct ProcfsThreadSource {
    task_dir: PathBuf,
    ticks_per_sec: u64,
    origin: Instant,
}

impl ProcfsThreadSource {
    /// Source for the threads of the current process.
    pub fn new() -> Self {
        Self::with_task_dir("/proc/self/task")
    }

    /// Source rooted at an arbitrary task directory.
    pub fn with_task_dir(task_dir: impl Into<PathBuf>) -> Self {
        let ticks_per_sec = clock_ticks_per_sec();
        debug!(ticks_per_sec, "procfs thread source initialized");
        Self {
            task_dir: task_dir.into(),
            ticks_per_sec,
            origin: Instant::now(),
        }
    }

    fn ticks_to_nanos(&self, ticks: u64) -> u64 {
        ticks.saturating_mul(NANOS_PER_SEC) / self.ticks_per_sec
    }
}

impl Default for ProcfsThreadSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadSource for ProcfsThreadSource {
    fn list_threads(&self) -> SamplerResult<Vec<ThreadDescriptor>> {
        let entries = std::fs::read_dir(&self.task_dir).map_err(|e| SamplerError::Io {
            path: self.task_dir.display().to_string(),
            source: e,
        })?;

        let mut threads = Vec::new();
        for entry in entries.flatten() {
            let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|s| s.parse::<u64>().ok())
            else {
                continue;
            };

            // A thread that exits mid-listing simply drops out.
            match std::fs::read_to_string(entry.path().join("comm")) {
                Ok(comm) => threads.push(ThreadDescriptor {
                    id: ThreadId(id),
                    name: comm.trim_end_matches('\n').to_string(),
                }),
                Err(e) if is_gone(&e) => continue,
                Err(e) => {
                    return Err(SamplerError::Io {
                        path: entry.path().join("comm").display().to_string(),
                        source: e,
                    });
                }
            }
        }
        Ok(threads)
    }

    fn read_cpu_time(&self, id: ThreadId) -> SamplerResult<CpuTime> {
        let path = self.task_dir.join(id.0.to_string()).join("stat");
        let stat = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if is_gone(&e) => return Err(SamplerError::Vanished(id)),
            Err(e) => {
                return Err(SamplerError::Io {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };

        let (utime, stime) = parse_stat(&stat).ok_or_else(|| SamplerError::Parse {
            path: path.display().to_string(),
            reason: "missing utime/stime fields".to_string(),
        })?;

        let user_nanos = self.ticks_to_nanos(utime);
        Ok(CpuTime {
            user_nanos,
            total_nanos: self.ticks_to_nanos(utime.saturating_add(stime)),
        })
    }

    fn monotonic_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// Extract `(utime, stime)` from a `stat` line.
///
/// The thread name may contain spaces and parentheses, so fields are
/// counted from the last closing parenthesis.
fn parse_stat(stat: &str) -> Option<(u64, u64)> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let utime = fields.get(UTIME_FIELD)?.parse().ok()?;
    let stime = fields.get(STIME_FIELD)?.parse().ok()?;
    Some((utime, stime))
}

/// ENOENT or ESRCH: the task directory is gone.
fn is_gone(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::NotFound || e.raw_os_error() == Some(libc::ESRCH)
}

#[cfg(unix)]
fn clock_ticks_per_sec() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 { ticks as u64 } else { 100 }
}

#[cfg(not(unix))]
fn clock_ticks_per_sec() -> u64 {
    100
}
