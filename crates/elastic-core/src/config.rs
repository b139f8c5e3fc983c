//! elastic.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Longest thread name Linux keeps is 15 bytes; leave room for "-<id>".
const MAX_THREAD_PREFIX_LEN: usize = 14;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElasticConfig {
    #[serde(default)]
    pub autoscaler: AutoscalerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoscalerConfig {
    pub min_instances: Option<u32>,
    pub max_instances: Option<u32>,
    pub load_threshold: Option<f64>,
    pub grace_period_cycles: Option<u32>,
    pub monitor_window: Option<usize>,
    pub max_threshold_violations: Option<usize>,
    pub check_interval_ms: Option<u64>,
    pub polling_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub thread_prefix: Option<String>,
    pub load_factor: Option<u32>,
    pub port: Option<u16>,
    pub queue_capacity: Option<usize>,
}

/// Validated autoscaler policy, consumed once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoscaleSettings {
    pub min_instances: u32,
    pub max_instances: u32,
    /// Per-thread load above which an interval counts as a violation.
    pub load_threshold: f64,
    pub grace_period_cycles: u32,
    /// Number of intervals kept per thread.
    pub monitor_window: usize,
    /// Already clamped to `monitor_window`.
    pub max_threshold_violations: usize,
    pub check_interval: Duration,
    pub polling_interval: Duration,
    /// Name prefix that identifies worker threads.
    pub thread_prefix: String,
}

impl Default for AutoscaleSettings {
    fn default() -> Self {
        Self {
            min_instances: 1,
            max_instances: default_max_instances(),
            load_threshold: 0.8,
            grace_period_cycles: 5,
            monitor_window: 10,
            max_threshold_violations: 5,
            check_interval: Duration::from_millis(5000),
            polling_interval: Duration::from_millis(1000),
            thread_prefix: "pool-worker".to_string(),
        }
    }
}

impl AutoscaleSettings {
    /// Whether each checking tick sees a whole number of polling ticks.
    pub fn intervals_aligned(&self) -> bool {
        self.check_interval.as_nanos() % self.polling_interval.as_nanos() == 0
    }
}

/// Settings for the synthetic worker service.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub thread_prefix: String,
    /// Iterations of the synthetic workload per request.
    pub load_factor: u32,
    pub port: u16,
    pub queue_capacity: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            thread_prefix: "pool-worker".to_string(),
            load_factor: 10_000,
            port: 18080,
            queue_capacity: 1024,
        }
    }
}

impl ElasticConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ElasticConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the autoscaler section and fill in defaults.
    ///
    /// `max_threshold_violations` is clamped to `monitor_window` here,
    /// since a count can never exceed the number of recorded intervals.
    pub fn settings(&self) -> ConfigResult<AutoscaleSettings> {
        let defaults = AutoscaleSettings::default();
        let a = &self.autoscaler;

        let min_instances = a.min_instances.unwrap_or(defaults.min_instances);
        let max_instances = a.max_instances.unwrap_or(defaults.max_instances);
        if max_instances < min_instances {
            return Err(ConfigError::MaxBelowMin {
                min: min_instances,
                max: max_instances,
            });
        }

        let load_threshold = a.load_threshold.unwrap_or(defaults.load_threshold);
        if !(load_threshold > 0.0 && load_threshold <= 1.0) {
            return Err(ConfigError::ThresholdOutOfRange(load_threshold));
        }

        let monitor_window = a.monitor_window.unwrap_or(defaults.monitor_window);
        if monitor_window == 0 {
            return Err(ConfigError::EmptyWindow);
        }

        let max_threshold_violations = a
            .max_threshold_violations
            .unwrap_or(defaults.max_threshold_violations);
        if max_threshold_violations == 0 {
            return Err(ConfigError::ZeroViolations);
        }

        let check_ms = a
            .check_interval_ms
            .unwrap_or(defaults.check_interval.as_millis() as u64);
        if check_ms == 0 {
            return Err(ConfigError::ZeroInterval("check_interval_ms"));
        }
        let polling_ms = a
            .polling_interval_ms
            .unwrap_or(defaults.polling_interval.as_millis() as u64);
        if polling_ms == 0 {
            return Err(ConfigError::ZeroInterval("polling_interval_ms"));
        }

        Ok(AutoscaleSettings {
            min_instances,
            max_instances,
            load_threshold,
            grace_period_cycles: a.grace_period_cycles.unwrap_or(defaults.grace_period_cycles),
            monitor_window,
            max_threshold_violations: max_threshold_violations.min(monitor_window),
            check_interval: Duration::from_millis(check_ms),
            polling_interval: Duration::from_millis(polling_ms),
            thread_prefix: self.thread_prefix()?,
        })
    }

    /// Validate the worker section and fill in defaults.
    pub fn worker_settings(&self) -> ConfigResult<WorkerSettings> {
        let defaults = WorkerSettings::default();
        let w = &self.worker;
        Ok(WorkerSettings {
            thread_prefix: self.thread_prefix()?,
            load_factor: w.load_factor.unwrap_or(defaults.load_factor),
            port: w.port.unwrap_or(defaults.port),
            queue_capacity: w.queue_capacity.unwrap_or(defaults.queue_capacity).max(1),
        })
    }

    fn thread_prefix(&self) -> ConfigResult<String> {
        let prefix = self
            .worker
            .thread_prefix
            .clone()
            .unwrap_or_else(|| WorkerSettings::default().thread_prefix);
        if prefix.is_empty() || prefix.len() > MAX_THREAD_PREFIX_LEN {
            return Err(ConfigError::ThreadPrefix(prefix));
        }
        Ok(prefix)
    }
}

fn default_max_instances() -> u32 {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1);
    cpus * 2
}
