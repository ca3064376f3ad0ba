//! Configuration schema definitions.
//!
//! This module defines the configuration structure for the orchestrator and
//! the service manifest consumed by the CLI. All types derive Serde traits for
//! deserialization from TOML files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dependency::ServiceNode;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Parallel initializer settings.
    pub initializer: InitializerConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// Service manifest (simulation and planning only).
    pub services: Vec<ServiceSpec>,

    /// Services to leave out of this run.
    pub disabled: Vec<String>,
}

impl LifecycleConfig {
    /// Whether `name` takes part in this run.
    pub fn is_enabled(&self, name: &str) -> bool {
        !self.disabled.iter().any(|disabled| disabled == name)
    }

    /// Dependency nodes for the enabled manifest entries.
    pub fn enabled_nodes(&self) -> Vec<ServiceNode> {
        self.services
            .iter()
            .filter(|spec| self.is_enabled(&spec.name))
            .map(ServiceSpec::node)
            .collect()
    }
}

/// How the delay between init attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Sleep `retry_interval_ms` before every retry.
    #[default]
    Fixed,
    /// Double the interval per retry, capped at `max_retry_interval_ms`, with jitter.
    Exponential,
}

/// Parallel initializer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InitializerConfig {
    /// Maximum services initialized at once within a layer (0 = unbounded).
    pub max_concurrency: usize,

    /// Per-attempt init deadline in milliseconds (0 = none).
    pub timeout_ms: u64,

    /// Extra attempts after the first failure.
    pub retry_count: u32,

    /// Delay before each retry in milliseconds.
    pub retry_interval_ms: u64,

    /// Retry delay growth.
    pub backoff: BackoffStrategy,

    /// Upper bound for exponential back-off in milliseconds.
    pub max_retry_interval_ms: u64,
}

impl InitializerConfig {
    /// Per-attempt deadline, if any.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Base delay between attempts.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl Default for InitializerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 0,
            timeout_ms: 30_000,
            retry_count: 0,
            retry_interval_ms: 1_000,
            backoff: BackoffStrategy::Fixed,
            max_retry_interval_ms: 30_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

/// A service declared in the manifest.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceSpec {
    /// Unique service name.
    pub name: String,

    /// Ordering hint within a layer (lower first).
    pub priority: i32,

    /// Names of services this one needs.
    pub dependencies: Vec<String>,

    /// Simulated init duration in milliseconds.
    pub init_delay_ms: u64,

    /// Simulated close duration in milliseconds.
    pub close_delay_ms: u64,

    /// Number of initial init attempts that fail.
    pub fail_attempts: u32,
}

impl ServiceSpec {
    /// Dependency node for this entry.
    pub fn node(&self) -> ServiceNode {
        ServiceNode::new(self.name.clone(), self.priority, self.dependencies.clone())
    }
}
