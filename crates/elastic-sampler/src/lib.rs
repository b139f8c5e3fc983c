//! elastic-sampler — per-thread CPU time sampling.
//!
//! Takes point-in-time snapshots of cumulative user and total CPU time
//! for the worker threads of this process and turns two consecutive
//! snapshots of the same thread into a [`LoadInterval`].
//!
//! # Architecture
//!
//! ```text
//! ThreadSource (trait)
//!   ├── list_threads()      → [ThreadDescriptor]
//!   ├── read_cpu_time(id)   → CpuTime
//!   └── monotonic_nanos()
//!
//! capture_all(source, selector) → { ThreadId → CpuTimeSample }
//! LoadInterval::between(begin, end) → LoadInterval
//! ```
//!
//! [`ProcfsThreadSource`] implements the source on Linux by reading
//! `/proc/self/task`.

pub mod error;
pub mod interval;
pub mod procfs;
pub mod sample;
pub mod source;
pub mod thread;

pub use error::{LoadIntervalError, SamplerError, SamplerResult};
pub use interval::LoadInterval;
pub use procfs::ProcfsThreadSource;
pub use sample::{CpuTimeSample, capture_all};
pub use source::ThreadSource;
pub use thread::{CpuTime, ThreadDescriptor, ThreadId, ThreadNamePrefix};
