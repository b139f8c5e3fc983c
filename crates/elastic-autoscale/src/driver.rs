//! The autoscaler control loop.
//!
//! One task owns the load window, the policy and the pool controller and
//! handles polling ticks, checking ticks and lifecycle completions one at
//! a time. Nothing else reads or writes that state; observers get the
//! [`AutoscalerStatus`] published on a watch channel.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout_at};
use tracing::{debug, info, warn};

use elastic_core::AutoscaleSettings;
use elastic_sampler::{ThreadNamePrefix, ThreadSource, capture_all};

use crate::policy::{ScaleDecision, ScalePolicy};
use crate::pool::{LifecycleEvent, PoolController, WorkerLifecycle};
use crate::status::{AutoscalerStatus, LoadSummary, ThreadLoad};
use crate::window::{LoadStatsWindow, RecordOutcome, count_violations};

pub struct Autoscaler {
    settings: AutoscaleSettings,
    source: Arc<dyn ThreadSource>,
    selector: ThreadNamePrefix,
    window: LoadStatsWindow,
    policy: ScalePolicy,
    pool: PoolController,
    /// Completions of requests issued by `pool`.
    events: mpsc::UnboundedReceiver<LifecycleEvent>,
    status: watch::Sender<AutoscalerStatus>,
    checks: u64,
    last_decision: Option<ScaleDecision>,
}

impl Autoscaler {
    /// Create an autoscaler over the threads of `source` whose name starts
    /// with `settings.thread_prefix`, scaling workers through `lifecycle`.
    pub fn new(
        settings: AutoscaleSettings,
        source: Arc<dyn ThreadSource>,
        lifecycle: Arc<dyn WorkerLifecycle>,
    ) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        let pool = PoolController::new(
            lifecycle,
            events_tx,
            settings.min_instances,
            settings.max_instances,
        )
        .with_start_deadline(settings.check_interval);
        let (status, _) = watch::channel(AutoscalerStatus::default());

        Self {
            selector: ThreadNamePrefix::new(settings.thread_prefix.clone()),
            window: LoadStatsWindow::new(settings.monitor_window),
            policy: ScalePolicy::new(&settings),
            settings,
            source,
            pool,
            events,
            status,
            checks: 0,
            last_decision: None,
        }
    }

    /// Subscribe to status snapshots.
    pub fn subscribe(&self) -> watch::Receiver<AutoscalerStatus> {
        self.status.subscribe()
    }

    /// Start `min_instances` workers and wait for their completions, for
    /// at most one checking interval.
    pub async fn bootstrap(&mut self) {
        info!(min = self.settings.min_instances, "initializing instances");
        for _ in 0..self.settings.min_instances {
            self.pool.scale_up();
        }
        let deadline = Instant::now() + self.settings.check_interval;
        while self.pool.has_pending() {
            match timeout_at(deadline, self.events.recv()).await {
                Ok(Some(event)) => self.on_event(event),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        pending = self.pool.pending_starts(),
                        "instance starts still pending, starting the control loop"
                    );
                    break;
                }
            }
        }
        info!(
            live = self.pool.live_count(),
            threshold_percent = self.settings.load_threshold * 100.0,
            "autoscaler initialized"
        );
        self.publish_status();
    }

    /// Polling tick: sample worker threads and fold them into the window.
    pub fn poll(&mut self) {
        let selector = &self.selector;
        let samples = match capture_all(self.source.as_ref(), |t| selector.matches(t)) {
            Ok(samples) => samples,
            Err(e) => {
                warn!(error = %e, "thread sampling failed");
                return;
            }
        };

        // Threads missing from this round have exited; pool members never
        // come back under the same id.
        let dropped = self.window.retain_threads(|id| samples.contains_key(&id));
        if dropped > 0 {
            debug!(dropped, "forgetting exited threads");
        }

        for sample in samples.into_values() {
            if let RecordOutcome::Discarded(e) = self.window.record(sample) {
                warn!(error = %e, "discarding sample pair");
            }
        }
    }

    /// Checking tick: evaluate the policy and act on the pool.
    pub fn check(&mut self) -> ScaleDecision {
        for (thread_id, history) in self.window.histories() {
            if let Some(latest) = history.latest() {
                info!(%thread_id, "thread load: {latest}");
            }
        }

        let evaluation = self.policy.evaluate(&mut self.window);
        info!(violations = ?evaluation.violations, "threads overload status");

        let live = self.pool.live_count();
        match evaluation.decision {
            ScaleDecision::ScaleUp => {
                info!(from = live, to = live + 1, "scaling up");
                self.pool.scale_up();
            }
            ScaleDecision::ScaleDown => {
                info!(from = live, to = live.saturating_sub(1), "scaling down");
                self.pool.scale_down();
            }
            ScaleDecision::Hold => {
                debug!(grace = self.policy.grace_counter(), live, "holding");
            }
        }
        self.pool.ensure_floor();

        self.checks += 1;
        self.last_decision = Some(evaluation.decision);
        self.publish_status();
        evaluation.decision
    }

    /// Apply a lifecycle completion.
    pub fn on_event(&mut self, event: LifecycleEvent) {
        self.pool.apply(event);
        self.publish_status();
    }

    /// Run the control loop until shutdown signal.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            polling_ms = self.settings.polling_interval.as_millis() as u64,
            check_ms = self.settings.check_interval.as_millis() as u64,
            prefix = %self.selector.as_str(),
            "autoscaler started"
        );
        if !self.settings.intervals_aligned() {
            warn!("check interval is not a multiple of the polling interval");
        }

        tokio::select! {
            _ = self.bootstrap() => {}
            _ = shutdown.changed() => {
                info!("autoscaler shutting down");
                return;
            }
        }

        let now = Instant::now();
        let mut polling = interval_at(
            now + self.settings.polling_interval,
            self.settings.polling_interval,
        );
        polling.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut checking = interval_at(
            now + self.settings.check_interval,
            self.settings.check_interval,
        );
        checking.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = polling.tick() => self.poll(),
                _ = checking.tick() => {
                    self.check();
                }
                Some(event) = self.events.recv() => self.on_event(event),
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            }
        }
    }

    fn publish_status(&self) {
        let threshold = self.settings.load_threshold;
        let mut threads: Vec<ThreadLoad> = self
            .window
            .histories()
            .map(|(thread_id, history)| ThreadLoad {
                thread_id,
                samples: history.len(),
                violations: count_violations(history, threshold),
                latest: history.latest().map(LoadSummary::from),
            })
            .collect();
        threads.sort_by_key(|t| t.thread_id);

        self.status.send_replace(AutoscalerStatus {
            min_instances: self.pool.min_instances(),
            max_instances: self.pool.max_instances(),
            live_workers: self.pool.live_workers(),
            pending_starts: self.pool.pending_starts(),
            stopping: self.pool.stopping_count(),
            grace_counter: self.policy.grace_counter(),
            checks: self.checks,
            last_decision: self.last_decision,
            threads,
        });
    }
}
