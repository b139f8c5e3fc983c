//! elastic-worker — the pool members the autoscaler grows and shrinks.
//!
//! Every worker is a dedicated OS thread named `<prefix>-<id>` running a
//! single-threaded tokio runtime. All workers pull from one shared job
//! queue, so adding a worker adds request-handling capacity and the
//! sampler can attribute CPU time to pool threads by name.
//!
//! ```text
//! WorkerPool (implements WorkerLifecycle)
//!   ├── start() → spawn thread "<prefix>-<id>", wait until it runs
//!   ├── stop(id) → signal shutdown, join the thread
//!   └── submit() → queue a job, await the worker's reply
//! ```

pub mod error;
pub mod pool;
pub mod workload;

pub use error::{WorkerError, WorkerResult};
pub use pool::WorkerPool;
pub use workload::{WorkResult, synthetic_load};
