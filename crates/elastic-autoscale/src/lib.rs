//! elastic-autoscale — CPU-load driven scaling of a worker thread pool.
//!
//! Samples the CPU time of worker threads on a polling tick, keeps a
//! bounded per-thread window of load intervals, and on a checking tick
//! decides whether to grow or shrink the pool.
//!
//! # Scaling Algorithm
//!
//! ```text
//! violations(thread) = |{ i in window(thread) : i.total_percent > load_threshold }|
//!
//! if any thread has violations >= max_threshold_violations:
//!     ScaleUp, clear every window, grace = grace_period_cycles
//! elif every tracked thread has 0 violations and grace == 0:
//!     ScaleDown
//! else:
//!     Hold
//! if not ScaleUp and grace > 0:
//!     grace -= 1
//! ```
//!
//! # Architecture
//!
//! ```text
//! Autoscaler (single task, owns all state)
//!   ├── polling tick  → capture_all → LoadStatsWindow::record
//!   ├── checking tick → ScalePolicy::evaluate → PoolController
//!   └── lifecycle events (start/stop completions) → PoolController
//! ```

pub mod driver;
pub mod error;
pub mod policy;
pub mod pool;
pub mod status;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use driver::Autoscaler;
pub use error::{LifecycleError, LifecycleResult};
pub use policy::{Evaluation, ScaleDecision, ScalePolicy};
pub use pool::{BoxFuture, LifecycleEvent, PoolController, WorkerId, WorkerLifecycle};
pub use status::{AutoscalerStatus, LoadSummary, ThreadLoad};
pub use window::{LoadHistory, LoadStatsWindow, RecordOutcome, count_violations};
