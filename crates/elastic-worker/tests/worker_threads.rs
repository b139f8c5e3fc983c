//! Worker threads as seen by the procfs sampler.
//!
//! Validates that pool members are visible to the sampler under their
//! name prefix and accumulate CPU time while serving jobs.

#![cfg(target_os = "linux")]

use elastic_autoscale::WorkerLifecycle;
use elastic_core::WorkerSettings;
use elastic_sampler::{ProcfsThreadSource, ThreadNamePrefix, capture_all};
use elastic_worker::WorkerPool;

/// Tests run concurrently, so each uses its own thread prefix.
fn test_pool(prefix: &str) -> WorkerPool {
    WorkerPool::new(WorkerSettings {
        thread_prefix: prefix.to_string(),
        load_factor: 200_000,
        port: 0,
        queue_capacity: 16,
    })
}

#[tokio::test]
async fn sampler_sees_pool_threads() {
    let pool = test_pool("itest-seen");
    let source = ProcfsThreadSource::new();
    let selector = ThreadNamePrefix::new("itest-seen");

    let id = pool.start().await.unwrap();
    let samples = capture_all(&source, |t| selector.matches(t)).unwrap();
    assert_eq!(samples.len(), 1);
    let sample = samples.values().next().unwrap();
    assert_eq!(sample.thread_name, pool.thread_name(id));

    pool.stop(id).await.unwrap();
    let samples = capture_all(&source, |t| selector.matches(t)).unwrap();
    assert!(samples.is_empty());
}

#[tokio::test]
async fn serving_jobs_charges_worker_cpu_time() {
    let pool = test_pool("itest-cpu");
    let source = ProcfsThreadSource::new();
    let selector = ThreadNamePrefix::new("itest-cpu");
    pool.start().await.unwrap();

    let before = capture_all(&source, |t| selector.matches(t)).unwrap();
    for _ in 0..20 {
        pool.submit().await.unwrap();
    }
    let after = capture_all(&source, |t| selector.matches(t)).unwrap();

    let (tid, begin) = before.into_iter().next().unwrap();
    let end = &after[&tid];
    assert!(end.timestamp_nanos > begin.timestamp_nanos);
    assert!(end.total_time_nanos >= begin.total_time_nanos);
    assert!(end.total_time_nanos >= end.user_time_nanos);

    pool.stop_all().await;
}
