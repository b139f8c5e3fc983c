//! Read-only snapshot of autoscaler state, published after every change.

use serde::Serialize;

use elastic_sampler::{LoadInterval, ThreadId};

use crate::policy::ScaleDecision;
use crate::pool::WorkerId;

#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoscalerStatus {
    pub min_instances: u32,
    pub max_instances: u32,
    pub live_workers: Vec<WorkerId>,
    pub pending_starts: usize,
    pub stopping: usize,
    pub grace_counter: u32,
    /// Number of checking ticks evaluated so far.
    pub checks: u64,
    pub last_decision: Option<ScaleDecision>,
    pub threads: Vec<ThreadLoad>,
}

/// Load of one tracked worker thread.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadLoad {
    pub thread_id: ThreadId,
    pub samples: usize,
    pub violations: usize,
    pub latest: Option<LoadSummary>,
}

/// The most recent interval of a thread.
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub thread_name: String,
    pub interval_nanos: u64,
    pub user_nanos: u64,
    pub system_nanos: u64,
    pub total_nanos: u64,
    pub user: f64,
    pub system: f64,
    pub total: f64,
}

impl From<&LoadInterval> for LoadSummary {
    fn from(i: &LoadInterval) -> Self {
        Self {
            thread_name: i.thread_name.clone(),
            interval_nanos: i.interval_nanos,
            user_nanos: i.user_delta_nanos,
            system_nanos: i.system_delta_nanos(),
            total_nanos: i.total_delta_nanos,
            user: i.user_percent(),
            system: i.system_percent(),
            total: i.total_percent(),
        }
    }
}
