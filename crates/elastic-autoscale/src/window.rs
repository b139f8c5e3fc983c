//! Per-thread sliding windows of load intervals.

use std::collections::{HashMap, VecDeque};

use elastic_sampler::{CpuTimeSample, LoadInterval, LoadIntervalError, ThreadId};

/// Bounded history of load intervals for one thread, newest first.
#[derive(Debug, Clone)]
pub struct LoadHistory {
    entries: VecDeque<LoadInterval>,
    capacity: usize,
}

impl LoadHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert the newest interval, evicting the oldest once over capacity.
    pub fn push(&mut self, interval: LoadInterval) {
        self.entries.push_front(interval);
        self.entries.truncate(self.capacity);
    }

    /// The most recent interval.
    pub fn latest(&self) -> Option<&LoadInterval> {
        self.entries.front()
    }

    /// Intervals from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &LoadInterval> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Number of intervals whose total load is strictly above `threshold`.
pub fn count_violations(history: &LoadHistory, threshold: f64) -> usize {
    history
        .iter()
        .filter(|i| i.total_percent() > threshold)
        .count()
}

/// What [`LoadStatsWindow::record`] did with a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First observation of the thread; stored as baseline only.
    Baseline,
    /// An interval was appended to the thread's history.
    Recorded,
    /// The pair was corrupt; the sample replaced the baseline.
    Discarded(LoadIntervalError),
}

/// Baselines and load histories of the observed worker threads.
///
/// Histories are created on the first interval of a thread. Every pool
/// member is a fresh OS thread, so the owner calls
/// [`retain_threads`](Self::retain_threads) to forget threads that exited.
#[derive(Debug)]
pub struct LoadStatsWindow {
    capacity: usize,
    baselines: HashMap<ThreadId, CpuTimeSample>,
    histories: HashMap<ThreadId, LoadHistory>,
}

impl LoadStatsWindow {
    /// Window keeping `capacity` intervals per thread (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            baselines: HashMap::new(),
            histories: HashMap::new(),
        }
    }

    /// Fold a fresh sample into the window.
    pub fn record(&mut self, sample: CpuTimeSample) -> RecordOutcome {
        let thread_id = sample.thread_id;
        let Some(previous) = self.baselines.insert(thread_id, sample) else {
            return RecordOutcome::Baseline;
        };

        match LoadInterval::between(&previous, &self.baselines[&thread_id]) {
            Ok(interval) => {
                let capacity = self.capacity;
                self.histories
                    .entry(thread_id)
                    .or_insert_with(|| LoadHistory::new(capacity))
                    .push(interval);
                RecordOutcome::Recorded
            }
            Err(e) => RecordOutcome::Discarded(e),
        }
    }

    pub fn history(&self, thread_id: ThreadId) -> Option<&LoadHistory> {
        self.histories.get(&thread_id)
    }

    /// All tracked histories, in no particular order.
    pub fn histories(&self) -> impl Iterator<Item = (ThreadId, &LoadHistory)> {
        self.histories.iter().map(|(id, h)| (*id, h))
    }

    /// Number of threads with a history.
    pub fn tracked_threads(&self) -> usize {
        self.histories.len()
    }

    /// Forget the baseline and history of every thread `keep` rejects.
    ///
    /// Returns the number of threads dropped.
    pub fn retain_threads(&mut self, mut keep: impl FnMut(ThreadId) -> bool) -> usize {
        let before = self.baselines.len();
        self.baselines.retain(|id, _| keep(*id));
        let baselines = &self.baselines;
        self.histories.retain(|id, _| baselines.contains_key(id));
        before - self.baselines.len()
    }

    /// Empty every history; baselines are kept so sampling continues.
    pub fn clear_histories(&mut self) {
        for history in self.histories.values_mut() {
            history.clear();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
