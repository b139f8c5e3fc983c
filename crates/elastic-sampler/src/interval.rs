//! Load over the interval between two samples of the same thread.

use std::fmt;

use crate::error::LoadIntervalError;
use crate::sample::CpuTimeSample;
use crate::thread::ThreadId;

/// CPU time a thread consumed between two consecutive samples.
///
/// The percentages are fractions of wall-clock interval time and are
/// deliberately not clamped: a time source that accounts one thread
/// identity across several cores can report values above 1.0, and that is
/// a real saturation signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadInterval {
    pub thread_id: ThreadId,
    pub thread_name: String,
    /// Always greater than zero.
    pub interval_nanos: u64,
    pub user_delta_nanos: u64,
    /// At least `user_delta_nanos`.
    pub total_delta_nanos: u64,
}

impl LoadInterval {
    /// Compute the interval between `begin` and `end`.
    ///
    /// Both samples must belong to the same thread. A zero-length interval
    /// or any counter running backwards is rejected.
    ///
    /// # Panics
    ///
    /// Panics if the samples belong to different threads.
    pub fn between(
        begin: &CpuTimeSample,
        end: &CpuTimeSample,
    ) -> Result<Self, LoadIntervalError> {
        assert_eq!(
            begin.thread_id, end.thread_id,
            "load interval between samples of different threads"
        );
        let thread_id = end.thread_id;
        let regression = |counter| LoadIntervalError::Regression { thread_id, counter };

        let interval_nanos = end
            .timestamp_nanos
            .checked_sub(begin.timestamp_nanos)
            .ok_or_else(|| regression("monotonic clock"))?;
        if interval_nanos == 0 {
            return Err(LoadIntervalError::EmptyInterval { thread_id });
        }

        let user_delta_nanos = end
            .user_time_nanos
            .checked_sub(begin.user_time_nanos)
            .ok_or_else(|| regression("user time"))?;
        let total_delta_nanos = end
            .total_time_nanos
            .checked_sub(begin.total_time_nanos)
            .ok_or_else(|| regression("total time"))?;
        if total_delta_nanos < user_delta_nanos {
            return Err(regression("system time"));
        }

        Ok(Self {
            thread_id,
            thread_name: end.thread_name.clone(),
            interval_nanos,
            user_delta_nanos,
            total_delta_nanos,
        })
    }

    pub fn system_delta_nanos(&self) -> u64 {
        self.total_delta_nanos - self.user_delta_nanos
    }

    pub fn user_percent(&self) -> f64 {
        self.user_delta_nanos as f64 / self.interval_nanos as f64
    }

    pub fn system_percent(&self) -> f64 {
        self.system_delta_nanos() as f64 / self.interval_nanos as f64
    }

    pub fn total_percent(&self) -> f64 {
        self.total_delta_nanos as f64 / self.interval_nanos as f64
    }
}

impl fmt::Display for LoadInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] tot: {:.2}%  usr: {:.2}%  sys: {:.2}%\ttot: {} μs  usr: {} μs  sys: {} μs",
            self.thread_name,
            100.0 * self.total_percent(),
            100.0 * self.user_percent(),
            100.0 * self.system_percent(),
            self.total_delta_nanos / 1000,
            self.user_delta_nanos / 1000,
            self.system_delta_nanos() / 1000,
        )
    }
}
