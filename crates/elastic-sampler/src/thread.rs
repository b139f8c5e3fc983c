//! Thread identity types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque OS thread identifier, stable for the thread's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live thread as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadDescriptor {
    pub id: ThreadId,
    pub name: String,
}

/// Cumulative CPU time consumed by one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTime {
    pub user_nanos: u64,
    /// User plus system time.
    pub total_nanos: u64,
}

/// Selects threads whose name starts with a fixed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadNamePrefix(String);

impl ThreadNamePrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    pub fn matches(&self, thread: &ThreadDescriptor) -> bool {
        thread.name.starts_with(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
