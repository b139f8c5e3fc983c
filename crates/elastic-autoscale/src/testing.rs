//! In-memory collaborators for unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use elastic_sampler::{
    CpuTime, SamplerError, SamplerResult, ThreadDescriptor, ThreadId, ThreadSource,
};

use crate::error::{LifecycleError, LifecycleResult};
use crate::pool::{BoxFuture, WorkerId, WorkerLifecycle};

/// Lifecycle whose requests complete immediately.
pub(crate) struct FakeLifecycle {
    next_id: AtomicU64,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_starts: AtomicBool,
    fail_stops: AtomicBool,
    hang_starts: AtomicBool,
}

impl FakeLifecycle {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            fail_starts: AtomicBool::new(false),
            fail_stops: AtomicBool::new(false),
            hang_starts: AtomicBool::new(false),
        }
    }

    pub(crate) fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_starts(&self, fail: bool) {
        self.fail_starts.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_stops(&self, fail: bool) {
        self.fail_stops.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent starts never complete.
    pub(crate) fn hang_starts(&self, hang: bool) {
        self.hang_starts.store(hang, Ordering::SeqCst);
    }
}

impl WorkerLifecycle for FakeLifecycle {
    fn start(&self) -> BoxFuture<LifecycleResult<WorkerId>> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.hang_starts.load(Ordering::SeqCst) {
            return Box::pin(std::future::pending());
        }
        let result = if self.fail_starts.load(Ordering::SeqCst) {
            Err(LifecycleError::Start("refused".into()))
        } else {
            Ok(WorkerId(self.next_id.fetch_add(1, Ordering::SeqCst)))
        };
        Box::pin(async move { result })
    }

    fn stop(&self, worker: WorkerId) -> BoxFuture<LifecycleResult<()>> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail_stops.load(Ordering::SeqCst) {
            Err(LifecycleError::Stop {
                worker,
                reason: "refused".into(),
            })
        } else {
            Ok(())
        };
        Box::pin(async move { result })
    }
}

/// Thread source with a manually advanced clock.
pub(crate) struct FakeThreadSource {
    clock: AtomicU64,
    threads: Mutex<BTreeMap<ThreadId, (String, CpuTime)>>,
}

impl FakeThreadSource {
    pub(crate) fn new() -> Self {
        Self {
            clock: AtomicU64::new(0),
            threads: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn remove_thread(&self, id: u64) {
        self.threads.lock().unwrap().remove(&ThreadId(id));
    }

    pub(crate) fn add_thread(&self, id: u64, name: &str) {
        self.threads
            .lock()
            .unwrap()
            .insert(ThreadId(id), (name.to_string(), CpuTime::default()));
    }

    /// Advance the clock by `nanos` and charge each listed thread the
    /// given fraction of it as user time.
    pub(crate) fn advance(&self, nanos: u64, loads: &[(u64, f64)]) {
        self.clock.fetch_add(nanos, Ordering::SeqCst);
        let mut threads = self.threads.lock().unwrap();
        for (id, load) in loads {
            if let Some((_, time)) = threads.get_mut(&ThreadId(*id)) {
                let delta = (load * nanos as f64) as u64;
                time.user_nanos += delta;
                time.total_nanos += delta;
            }
        }
    }
}

impl ThreadSource for FakeThreadSource {
    fn list_threads(&self) -> SamplerResult<Vec<ThreadDescriptor>> {
        Ok(self
            .threads
            .lock()
            .unwrap()
            .iter()
            .map(|(id, (name, _))| ThreadDescriptor {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }

    fn read_cpu_time(&self, id: ThreadId) -> SamplerResult<CpuTime> {
        self.threads
            .lock()
            .unwrap()
            .get(&id)
            .map(|(_, time)| *time)
            .ok_or(SamplerError::Vanished(id))
    }

    fn monotonic_nanos(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }
}
