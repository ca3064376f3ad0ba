//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check manifest integrity (names present and unique)
//! - Validate value ranges (concurrency limit, back-off bounds, log level)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Dependencies on unknown services are not errors here; the resolver
//!   reports them as warnings at run time
//! - Cycles are left to the resolver as well

use std::collections::HashSet;

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::schema::{BackoffStrategy, LifecycleConfig};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("services[{index}] has an empty name")]
    EmptyServiceName { index: usize },

    #[error("service '{0}' is declared more than once")]
    DuplicateService(String),

    #[error("initializer.max_concurrency {value} exceeds the limit of {limit}")]
    ConcurrencyTooHigh { value: usize, limit: usize },

    #[error("initializer.max_retry_interval_ms ({max}) is below retry_interval_ms ({base})")]
    BackoffCapBelowBase { base: u64, max: u64 },

    #[error("observability.log_level '{0}' is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &LifecycleConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let init = &config.initializer;
    if init.max_concurrency > Semaphore::MAX_PERMITS {
        errors.push(ValidationError::ConcurrencyTooHigh {
            value: init.max_concurrency,
            limit: Semaphore::MAX_PERMITS,
        });
    }
    if init.backoff == BackoffStrategy::Exponential
        && init.max_retry_interval_ms < init.retry_interval_ms
    {
        errors.push(ValidationError::BackoffCapBelowBase {
            base: init.retry_interval_ms,
            max: init.max_retry_interval_ms,
        });
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for (index, spec) in config.services.iter().enumerate() {
        if spec.name.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceName { index });
            continue;
        }
        if !seen.insert(spec.name.as_str()) {
            errors.push(ValidationError::DuplicateService(spec.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
