//! Pool controller: owns the set of live workers and enforces bounds.
//!
//! Start and stop requests are spawned onto the runtime; their completion
//! comes back as a [`LifecycleEvent`] on a channel drained by the same task
//! that owns the controller. The live set only changes when a completion
//! is applied, never when a request is issued.
//!
//! A start that has not completed within the start deadline stops counting
//! against the bounds, so a hung request leaves room to scale up instead of
//! holding its slot forever. Its completion is still applied if it arrives.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::LifecycleResult;

/// Opaque identifier of a pool member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

pub type BoxFuture<T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send>>;

/// The worker lifecycle collaborator.
///
/// `start` resolves to a fresh, unique id once the worker is running;
/// `stop` resolves once the worker has exited.
pub trait WorkerLifecycle: Send + Sync {
    fn start(&self) -> BoxFuture<LifecycleResult<WorkerId>>;
    fn stop(&self, worker: WorkerId) -> BoxFuture<LifecycleResult<()>>;
}

/// Completion of a lifecycle request.
#[derive(Debug)]
pub enum LifecycleEvent {
    Started {
        ticket: u64,
        result: LifecycleResult<WorkerId>,
    },
    Stopped {
        worker: WorkerId,
        result: LifecycleResult<()>,
    },
}

/// Tracks live workers and in-flight requests for one pool.
pub struct PoolController {
    lifecycle: Arc<dyn WorkerLifecycle>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
    min_instances: u32,
    max_instances: u32,
    live: HashSet<WorkerId>,
    /// Issue time of each start in flight, by ticket.
    pending_starts: BTreeMap<u64, Instant>,
    next_ticket: u64,
    start_deadline: Option<Duration>,
    stopping: HashSet<WorkerId>,
}

impl PoolController {
    /// Create a controller; completions are delivered on `events`.
    pub fn new(
        lifecycle: Arc<dyn WorkerLifecycle>,
        events: mpsc::UnboundedSender<LifecycleEvent>,
        min_instances: u32,
        max_instances: u32,
    ) -> Self {
        Self {
            lifecycle,
            events,
            min_instances,
            max_instances,
            live: HashSet::new(),
            pending_starts: BTreeMap::new(),
            next_ticket: 0,
            start_deadline: None,
            stopping: HashSet::new(),
        }
    }

    /// Stop counting starts older than `deadline` against the bounds.
    pub fn with_start_deadline(mut self, deadline: Duration) -> Self {
        self.start_deadline = Some(deadline);
        self
    }

    /// Starts in flight that still count against the bounds.
    fn outstanding_starts(&self) -> usize {
        match self.start_deadline {
            None => self.pending_starts.len(),
            Some(deadline) => self
                .pending_starts
                .values()
                .filter(|issued| issued.elapsed() < deadline)
                .count(),
        }
    }

    /// Request one more worker unless the pool is at `max_instances`.
    ///
    /// Starts still in flight count against the limit until they are
    /// overdue. Returns whether a request was issued.
    pub fn scale_up(&mut self) -> bool {
        let outstanding = self.outstanding_starts();
        if self.live.len() + outstanding >= self.max_instances as usize {
            info!(
                live = self.live.len(),
                pending = outstanding,
                max = self.max_instances,
                "scale up canceled, instance limit reached"
            );
            return false;
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending_starts.insert(ticket, Instant::now());
        let lifecycle = self.lifecycle.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = lifecycle.start().await;
            let _ = events.send(LifecycleEvent::Started { ticket, result });
        });
        true
    }

    /// Request the stop of one arbitrary worker unless the pool is at
    /// `min_instances`.
    ///
    /// Workers already being stopped are neither counted nor chosen again.
    /// Returns whether a request was issued.
    pub fn scale_down(&mut self) -> bool {
        let remaining = self.live.len() - self.stopping.len();
        if remaining <= self.min_instances as usize {
            info!(
                live = self.live.len(),
                min = self.min_instances,
                "scale down canceled, minimum number of instances reached"
            );
            return false;
        }

        let Some(worker) = self
            .live
            .iter()
            .find(|w| !self.stopping.contains(w))
            .copied()
        else {
            return false;
        };

        info!(%worker, "stopping worker");
        self.stopping.insert(worker);
        let lifecycle = self.lifecycle.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = lifecycle.stop(worker).await;
            let _ = events.send(LifecycleEvent::Stopped { worker, result });
        });
        true
    }

    /// Issue starts until live plus outstanding workers reach
    /// `min_instances`.
    ///
    /// Returns the number of requests issued.
    pub fn ensure_floor(&mut self) -> usize {
        let projected = self.live.len() + self.outstanding_starts();
        let missing = (self.min_instances as usize).saturating_sub(projected);
        if missing > 0 {
            debug!(missing, min = self.min_instances, "restoring pool floor");
        }
        (0..missing).filter(|_| self.scale_up()).count()
    }

    /// Apply a completion to the pool state.
    pub fn apply(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Started { ticket, result } => {
                self.pending_starts.remove(&ticket);
                match result {
                    Ok(worker) => {
                        self.live.insert(worker);
                        info!(%worker, live = self.live.len(), "instance deployed");
                    }
                    Err(e) => {
                        warn!(error = %e, live = self.live.len(), "worker start failed");
                    }
                }
            }
            LifecycleEvent::Stopped { worker, result } => {
                self.stopping.remove(&worker);
                match result {
                    Ok(()) => {
                        self.live.remove(&worker);
                        info!(%worker, live = self.live.len(), "instance undeployed");
                    }
                    Err(e) => {
                        warn!(%worker, error = %e, "worker stop failed, keeping it in the pool");
                    }
                }
            }
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Live worker ids, sorted for display.
    pub fn live_workers(&self) -> Vec<WorkerId> {
        let mut workers: Vec<WorkerId> = self.live.iter().copied().collect();
        workers.sort();
        workers
    }

    /// Starts in flight, overdue ones included.
    pub fn pending_starts(&self) -> usize {
        self.pending_starts.len()
    }

    pub fn stopping_count(&self) -> usize {
        self.stopping.len()
    }

    /// Whether any request is still in flight.
    pub fn has_pending(&self) -> bool {
        !self.pending_starts.is_empty() || !self.stopping.is_empty()
    }

    pub fn min_instances(&self) -> u32 {
        self.min_instances
    }

    pub fn max_instances(&self) -> u32 {
        self.max_instances
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLifecycle;

    fn controller(
        lifecycle: &Arc<FakeLifecycle>,
        min: u32,
        max: u32,
    ) -> (PoolController, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PoolController::new(lifecycle.clone(), tx, min, max), rx)
    }

    async fn settle(pool: &mut PoolController, rx: &mut mpsc::UnboundedReceiver<LifecycleEvent>) {
        while pool.has_pending() {
            let event = rx.recv().await.unwrap();
            pool.apply(event);
        }
    }

    #[tokio::test]
    async fn scale_up_adds_worker_on_completion() {
        let lifecycle = Arc::new(FakeLifecycle::new());
        let (mut pool, mut rx) = controller(&lifecycle, 0, 2);

        assert!(pool.scale_up());
        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.pending_starts(), 1);

        settle(&mut pool, &mut rx).await;
        assert_eq!(pool.live_count(), 1);
        assert_eq!(lifecycle.starts(), 1);
    }

    #[tokio::test]
    async fn scale_up_at_max_is_noop() {
        let lifecycle = Arc::new(FakeLifecycle::new());
        let (mut pool, mut rx) = controller(&lifecycle, 0, 1);
        pool.scale_up();
        settle(&mut pool, &mut rx).await;

        assert!(!pool.scale_up());
        assert_eq!(lifecycle.starts(), 1);
        assert_eq!(pool.live_count(), 1);
    }

    #[tokio::test]
    async fn pending_starts_count_against_max() {
        let lifecycle = Arc::new(FakeLifecycle::new());
        let (mut pool, mut rx) = controller(&lifecycle, 0, 2);
        assert!(pool.scale_up());
        assert!(pool.scale_up());
        assert!(!pool.scale_up());

        settle(&mut pool, &mut rx).await;
        assert_eq!(pool.live_count(), 2);
        assert_eq!(lifecycle.starts(), 2);
    }

    #[tokio::test]
    async fn scale_down_at_min_is_noop() {
        let lifecycle = Arc::new(FakeLifecycle::new());
        let (mut pool, mut rx) = controller(&lifecycle, 1, 3);
        pool.scale_up();
        settle(&mut pool, &mut rx).await;

        assert!(!pool.scale_down());
        assert_eq!(lifecycle.stops(), 0);
        assert_eq!(pool.live_count(), 1);
    }

    #[tokio::test]
    async fn scale_down_removes_on_completion() {
        let lifecycle = Arc::new(FakeLifecycle::new());
        let (mut pool, mut rx) = controller(&lifecycle, 1, 3);
        pool.scale_up();
        pool.scale_up();
        settle(&mut pool, &mut rx).await;

        assert!(pool.scale_down());
        assert_eq!(pool.live_count(), 2);
        // The second stop would take the pool below min once the first lands.
        assert!(!pool.scale_down());

        settle(&mut pool, &mut rx).await;
        assert_eq!(pool.live_count(), 1);
        assert_eq!(lifecycle.stops(), 1);
    }

    #[tokio::test]
    async fn failed_start_leaves_pool_unchanged() {
        let lifecycle = Arc::new(FakeLifecycle::new());
        lifecycle.fail_starts(true);
        let (mut pool, mut rx) = controller(&lifecycle, 0, 3);

        pool.scale_up();
        settle(&mut pool, &mut rx).await;
        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.pending_starts(), 0);
    }

    #[tokio::test]
    async fn failed_stop_keeps_worker() {
        let lifecycle = Arc::new(FakeLifecycle::new());
        let (mut pool, mut rx) = controller(&lifecycle, 0, 3);
        pool.scale_up();
        settle(&mut pool, &mut rx).await;

        lifecycle.fail_stops(true);
        assert!(pool.scale_down());
        settle(&mut pool, &mut rx).await;
        assert_eq!(pool.live_count(), 1);
        assert_eq!(pool.stopping_count(), 0);
    }

    #[tokio::test]
    async fn overdue_start_frees_its_slot() {
        let lifecycle = Arc::new(FakeLifecycle::new());
        lifecycle.hang_starts(true);
        let (pool, mut rx) = controller(&lifecycle, 1, 1);
        let mut pool = pool.with_start_deadline(Duration::from_millis(20));

        assert!(pool.scale_up());
        assert!(!pool.scale_up());
        assert_eq!(pool.ensure_floor(), 0);

        tokio::time::sleep(Duration::from_millis(40)).await;
        lifecycle.hang_starts(false);
        assert_eq!(pool.ensure_floor(), 1);
        assert_eq!(pool.pending_starts(), 2);

        let event = rx.recv().await.unwrap();
        pool.apply(event);
        assert_eq!(pool.live_count(), 1);
        // Only the hung request is still in flight, and it no longer counts.
        assert_eq!(pool.pending_starts(), 1);
        assert!(!pool.scale_up());
        assert_eq!(lifecycle.starts(), 2);
    }

    #[tokio::test]
    async fn without_deadline_hung_start_keeps_its_slot() {
        let lifecycle = Arc::new(FakeLifecycle::new());
        lifecycle.hang_starts(true);
        let (mut pool, _rx) = controller(&lifecycle, 1, 1);

        assert!(pool.scale_up());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.ensure_floor(), 0);
        assert_eq!(lifecycle.starts(), 1);
    }

    #[tokio::test]
    async fn ensure_floor_restores_min() {
        let lifecycle = Arc::new(FakeLifecycle::new());
        let (mut pool, mut rx) = controller(&lifecycle, 2, 4);

        assert_eq!(pool.ensure_floor(), 2);
        assert_eq!(pool.ensure_floor(), 0);
        settle(&mut pool, &mut rx).await;
        assert_eq!(pool.live_count(), 2);
    }
}
