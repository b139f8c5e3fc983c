//! elastic-core — configuration shared by the Elastic crates.
//!
//! `elastic.toml` is parsed into [`ElasticConfig`] (every key optional),
//! then validated once at startup into [`AutoscaleSettings`] and
//! [`WorkerSettings`]. A configuration that violates a policy invariant
//! never produces settings, so the daemon refuses to start.

pub mod config;
pub mod error;

pub use config::{AutoscaleSettings, AutoscalerConfig, ElasticConfig, WorkerConfig, WorkerSettings};
pub use error::{ConfigError, ConfigResult};
