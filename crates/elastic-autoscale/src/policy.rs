//! Hysteresis scale decision over all tracked load windows.

use std::collections::BTreeMap;

use serde::Serialize;

use elastic_core::AutoscaleSettings;
use elastic_sampler::ThreadId;

use crate::window::{LoadStatsWindow, count_violations};

/// Outcome of one checking tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleDecision {
    ScaleUp,
    ScaleDown,
    Hold,
}

/// A decision together with the violation counts it was based on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub decision: ScaleDecision,
    pub violations: BTreeMap<ThreadId, usize>,
}

/// Debounced scale policy.
///
/// A single overloaded thread is enough to scale up. Scaling down needs
/// every tracked thread to be free of violations and the grace counter
/// armed by the last scale-up to have run out.
#[derive(Debug, Clone)]
pub struct ScalePolicy {
    load_threshold: f64,
    max_threshold_violations: usize,
    grace_period_cycles: u32,
    grace_counter: u32,
}

impl ScalePolicy {
    pub fn new(settings: &AutoscaleSettings) -> Self {
        Self {
            load_threshold: settings.load_threshold,
            max_threshold_violations: settings
                .max_threshold_violations
                .min(settings.monitor_window),
            grace_period_cycles: settings.grace_period_cycles,
            grace_counter: 0,
        }
    }

    /// Remaining checking ticks during which scale-down is suppressed.
    pub fn grace_counter(&self) -> u32 {
        self.grace_counter
    }

    /// Evaluate one checking tick.
    ///
    /// On scale-up every history in `window` is cleared so recovery is
    /// measured on fresh samples, and the grace counter is re-armed. It is
    /// not decremented in the cycle that armed it.
    pub fn evaluate(&mut self, window: &mut LoadStatsWindow) -> Evaluation {
        let violations: BTreeMap<ThreadId, usize> = window
            .histories()
            .map(|(id, history)| (id, count_violations(history, self.load_threshold)))
            .collect();

        let any_overloaded = violations
            .values()
            .any(|&count| count >= self.max_threshold_violations);
        // No observations is never "all clear".
        let all_clear = !violations.is_empty() && violations.values().all(|&count| count == 0);

        if any_overloaded {
            window.clear_histories();
            self.grace_counter = self.grace_period_cycles;
            return Evaluation {
                decision: ScaleDecision::ScaleUp,
                violations,
            };
        }

        let decision = if all_clear && self.grace_counter == 0 {
            ScaleDecision::ScaleDown
        } else {
            ScaleDecision::Hold
        };
        self.grace_counter = self.grace_counter.saturating_sub(1);

        Evaluation {
            decision,
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elastic_sampler::CpuTimeSample;

    const SECOND: u64 = 1_000_000_000;

    fn settings(window: usize, violations: usize, grace: u32) -> AutoscaleSettings {
        AutoscaleSettings {
            monitor_window: window,
            max_threshold_violations: violations,
            grace_period_cycles: grace,
            load_threshold: 0.8,
            ..AutoscaleSettings::default()
        }
    }

    /// Feed one thread a baseline and then one interval per load value.
    fn feed(window: &mut LoadStatsWindow, thread: u64, loads: &[f64]) {
        let mut ts = 0u64;
        let mut total = 0u64;
        let mut record = |ts: u64, total: u64| {
            window.record(CpuTimeSample {
                thread_id: ThreadId(thread),
                thread_name: format!("pool-worker-{thread}"),
                timestamp_nanos: ts,
                user_time_nanos: total,
                total_time_nanos: total,
            });
        };
        record(ts, total);
        for load in loads {
            ts += SECOND;
            total += (load * SECOND as f64) as u64;
            record(ts, total);
        }
    }

    #[test]
    fn overloaded_thread_scales_up_and_clears() {
        let mut window = LoadStatsWindow::new(5);
        feed(&mut window, 1, &[0.95, 0.95, 0.95, 0.1, 0.1]);
        let mut policy = ScalePolicy::new(&settings(5, 3, 2));

        let eval = policy.evaluate(&mut window);
        assert_eq!(eval.decision, ScaleDecision::ScaleUp);
        assert_eq!(eval.violations[&ThreadId(1)], 3);
        assert!(window.history(ThreadId(1)).unwrap().is_empty());
        assert_eq!(policy.grace_counter(), 2);
    }

    #[test]
    fn below_violation_limit_holds() {
        let mut window = LoadStatsWindow::new(5);
        feed(&mut window, 1, &[0.95, 0.95, 0.1, 0.1, 0.1]);
        let mut policy = ScalePolicy::new(&settings(5, 3, 0));

        let eval = policy.evaluate(&mut window);
        assert_eq!(eval.decision, ScaleDecision::Hold);
        assert_eq!(window.history(ThreadId(1)).unwrap().len(), 5);
    }

    #[test]
    fn all_clear_scales_down() {
        let mut window = LoadStatsWindow::new(5);
        feed(&mut window, 1, &[0.1, 0.2]);
        feed(&mut window, 2, &[0.3, 0.0]);
        let mut policy = ScalePolicy::new(&settings(5, 3, 0));

        assert_eq!(policy.evaluate(&mut window).decision, ScaleDecision::ScaleDown);
    }

    #[test]
    fn one_busy_thread_blocks_scale_down() {
        let mut window = LoadStatsWindow::new(5);
        feed(&mut window, 1, &[0.1, 0.2]);
        feed(&mut window, 2, &[0.9, 0.0]);
        let mut policy = ScalePolicy::new(&settings(5, 3, 0));

        assert_eq!(policy.evaluate(&mut window).decision, ScaleDecision::Hold);
    }

    #[test]
    fn empty_window_holds() {
        let mut window = LoadStatsWindow::new(5);
        let mut policy = ScalePolicy::new(&settings(5, 3, 0));
        let eval = policy.evaluate(&mut window);
        assert_eq!(eval.decision, ScaleDecision::Hold);
        assert!(eval.violations.is_empty());
    }

    #[test]
    fn grace_period_suppresses_scale_down() {
        let mut window = LoadStatsWindow::new(5);
        feed(&mut window, 1, &[0.95, 0.95, 0.95]);
        let mut policy = ScalePolicy::new(&settings(5, 3, 2));
        assert_eq!(policy.evaluate(&mut window).decision, ScaleDecision::ScaleUp);

        // History is empty but tracked: every thread reports zero violations.
        assert_eq!(policy.evaluate(&mut window).decision, ScaleDecision::Hold);
        assert_eq!(policy.evaluate(&mut window).decision, ScaleDecision::Hold);
        assert_eq!(policy.evaluate(&mut window).decision, ScaleDecision::ScaleDown);
        assert_eq!(policy.grace_counter(), 0);
    }

    #[test]
    fn grace_counts_down_while_holding_on_load() {
        let mut window = LoadStatsWindow::new(5);
        feed(&mut window, 1, &[0.95, 0.95, 0.95]);
        let mut policy = ScalePolicy::new(&settings(5, 3, 3));
        policy.evaluate(&mut window);

        feed(&mut window, 2, &[0.9]);
        assert_eq!(policy.evaluate(&mut window).decision, ScaleDecision::Hold);
        assert_eq!(policy.grace_counter(), 2);
    }

    #[test]
    fn violation_limit_clamped_to_window() {
        let mut window = LoadStatsWindow::new(2);
        feed(&mut window, 1, &[0.99, 0.99]);
        let mut policy = ScalePolicy::new(&settings(2, 10, 0));
        assert_eq!(policy.evaluate(&mut window).decision, ScaleDecision::ScaleUp);
    }
}
