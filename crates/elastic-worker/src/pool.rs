//! Thread-backed worker pool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use elastic_autoscale::{BoxFuture, LifecycleError, LifecycleResult, WorkerId, WorkerLifecycle};
use elastic_core::WorkerSettings;

use crate::error::{WorkerError, WorkerResult};
use crate::workload::{WorkResult, synthetic_load};

/// One queued request.
struct Job {
    ts: u64,
    reply: oneshot::Sender<WorkResult>,
}

type JobReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>;

/// A running worker thread.
struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    thread: std::thread::JoinHandle<()>,
}

struct Inner {
    settings: WorkerSettings,
    jobs_tx: mpsc::Sender<Job>,
    jobs_rx: JobReceiver,
    next_id: AtomicU64,
    workers: Mutex<HashMap<WorkerId, WorkerHandle>>,
}

/// Pool of named worker threads sharing one job queue.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<Inner>,
}

impl WorkerPool {
    pub fn new(settings: WorkerSettings) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel(settings.queue_capacity);
        Self {
            inner: Arc::new(Inner {
                settings,
                jobs_tx,
                jobs_rx: Arc::new(tokio::sync::Mutex::new(jobs_rx)),
                next_id: AtomicU64::new(1),
                workers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Number of running workers.
    pub fn worker_count(&self) -> usize {
        self.workers().len()
    }

    /// Thread name of a worker.
    pub fn thread_name(&self, worker: WorkerId) -> String {
        format!("{}-{}", self.inner.settings.thread_prefix, worker.0)
    }

    /// Queue one unit of work and wait for its result.
    pub async fn submit(&self) -> WorkerResult<WorkResult> {
        if self.worker_count() == 0 {
            return Err(WorkerError::NoWorkers);
        }

        let (reply, rx) = oneshot::channel();
        self.inner
            .jobs_tx
            .try_send(Job {
                ts: epoch_nanos(),
                reply,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => WorkerError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => WorkerError::QueueClosed,
            })?;
        rx.await.map_err(|_| WorkerError::Abandoned)
    }

    /// Stop every worker (for graceful shutdown).
    pub async fn stop_all(&self) {
        let ids: Vec<WorkerId> = self.workers().keys().copied().collect();
        for id in ids {
            if let Err(e) = self.stop_worker(id).await {
                warn!(worker = %id, error = %e, "failed to stop worker");
            }
        }
        info!("all workers stopped");
    }

    async fn start_worker(&self) -> LifecycleResult<WorkerId> {
        let id = WorkerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let name = self.thread_name(id);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();
        let jobs = self.inner.jobs_rx.clone();
        let load_factor = self.inner.settings.load_factor;

        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                runtime.block_on(run_worker(id, jobs, load_factor, shutdown_rx));
            })
            .map_err(|e| LifecycleError::Start(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => return Err(LifecycleError::Start(reason)),
            Err(_) => return Err(LifecycleError::Start(format!("{name} exited early"))),
        }

        self.workers().insert(id, WorkerHandle { shutdown, thread });
        debug!(worker = %id, thread = %name, "worker thread running");
        Ok(id)
    }

    async fn stop_worker(&self, id: WorkerId) -> LifecycleResult<()> {
        let handle = self
            .workers()
            .remove(&id)
            .ok_or(LifecycleError::UnknownWorker(id))?;

        let _ = handle.shutdown.send(true);
        match tokio::task::spawn_blocking(move || handle.thread.join()).await {
            Ok(Ok(())) => {
                debug!(worker = %id, "worker thread joined");
                if self.worker_count() == 0 {
                    self.abandon_queued().await;
                }
                Ok(())
            }
            Ok(Err(_)) => Err(LifecycleError::Stop {
                worker: id,
                reason: "worker thread panicked".to_string(),
            }),
            Err(e) => Err(LifecycleError::Stop {
                worker: id,
                reason: e.to_string(),
            }),
        }
    }

    /// Drop every queued job so its submitter sees `Abandoned`.
    async fn abandon_queued(&self) {
        let mut jobs = self.inner.jobs_rx.lock().await;
        let mut dropped = 0usize;
        while jobs.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!(dropped, "no workers left, abandoning queued jobs");
        }
    }

    fn workers(&self) -> std::sync::MutexGuard<'_, HashMap<WorkerId, WorkerHandle>> {
        self.inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl WorkerLifecycle for WorkerPool {
    fn start(&self) -> BoxFuture<LifecycleResult<WorkerId>> {
        let pool = self.clone();
        Box::pin(async move { pool.start_worker().await })
    }

    fn stop(&self, worker: WorkerId) -> BoxFuture<LifecycleResult<()>> {
        let pool = self.clone();
        Box::pin(async move { pool.stop_worker(worker).await })
    }
}

/// Worker thread body: take jobs until told to stop.
async fn run_worker(
    id: WorkerId,
    jobs: JobReceiver,
    load_factor: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut rng = StdRng::from_entropy();
    debug!(worker = %id, "worker loop starting");

    loop {
        let job = tokio::select! {
            _ = shutdown.changed() => break,
            job = next_job(&jobs) => job,
        };
        let Some(job) = job else { break };

        let started = Instant::now();
        let result = synthetic_load(&mut rng, load_factor);
        let _ = job.reply.send(WorkResult {
            ts: job.ts,
            result,
            duration_micros: started.elapsed().as_micros() as u64,
        });
    }

    debug!(worker = %id, "worker loop exited");
}

async fn next_job(jobs: &JobReceiver) -> Option<Job> {
    jobs.lock().await.recv().await
}

fn epoch_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
