//! Error taxonomy for the lifecycle orchestrator.
//!
//! # Propagation
//! - Cycle detection, hook failures and init failures are fatal to `Init`
//! - Missing dependencies are reported but never returned from `Init`
//! - Close-phase failures are logged and the first one is returned after
//!   every layer has been attempted

use std::time::Duration;
use thiserror::Error;

use crate::registry::HookPhase;

/// Opaque error produced by service implementations and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the crate.
pub type Result<T, E = LifecycleError> = std::result::Result<T, E>;

/// Errors raised while registering, resolving, initializing or closing services.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A service with this name is already registered.
    #[error("service '{0}' is already registered")]
    DuplicateRegistration(String),

    /// The active dependency graph contains a cycle.
    #[error("circular dependency detected: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    /// A service depends on names outside the active set.
    #[error("service '{service}' depends on inactive services: {}", .missing.join(", "))]
    MissingDependency { service: String, missing: Vec<String> },

    /// A lifecycle hook returned an error.
    #[error("{phase} hook failed for service '{service}': {source}")]
    HookFailure {
        service: String,
        phase: HookPhase,
        #[source]
        source: BoxError,
    },

    /// `Service::init` returned an error.
    #[error("service '{service}' failed to initialize: {source}")]
    ServiceInitFailure {
        service: String,
        #[source]
        source: BoxError,
    },

    /// `Service::close` returned an error.
    #[error("service '{service}' failed to close: {source}")]
    ServiceCloseFailure {
        service: String,
        #[source]
        source: BoxError,
    },

    /// Initialization did not complete before the per-service deadline.
    #[error("service '{service}' timed out after {timeout:?}")]
    ServiceTimeout { service: String, timeout: Duration },

    /// Another initialization of this service is in flight.
    #[error("service '{0}' is already initializing")]
    AlreadyInitializing(String),

    /// Every attempt failed; carries the last underlying error.
    #[error("service '{service}' failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        service: String,
        attempts: u32,
        #[source]
        source: Box<LifecycleError>,
    },

    /// The name is not registered (or not part of the resolved graph).
    #[error("unknown service '{0}'")]
    UnknownService(String),

    /// The caller's cancellation token fired before the service started.
    #[error("initialization of service '{service}' was cancelled")]
    Cancelled { service: String },

    /// The task driving this service panicked.
    #[error("lifecycle task for service '{service}' panicked")]
    TaskPanicked { service: String },

    /// The initialization order could not be computed.
    #[error("failed to resolve initialization order: {0}")]
    Resolution(#[source] Box<LifecycleError>),

    /// A layer failed; later layers were not started.
    #[error("initialization layer {layer} failed: {source}")]
    LayerFailed {
        layer: usize,
        #[source]
        source: Box<LifecycleError>,
    },
}

impl LifecycleError {
    /// Name of the service this error is about, if any.
    pub fn service(&self) -> Option<&str> {
        match self {
            LifecycleError::DuplicateRegistration(service)
            | LifecycleError::AlreadyInitializing(service)
            | LifecycleError::UnknownService(service) => Some(service),
            LifecycleError::MissingDependency { service, .. }
            | LifecycleError::HookFailure { service, .. }
            | LifecycleError::ServiceInitFailure { service, .. }
            | LifecycleError::ServiceCloseFailure { service, .. }
            | LifecycleError::ServiceTimeout { service, .. }
            | LifecycleError::RetriesExhausted { service, .. }
            | LifecycleError::Cancelled { service }
            | LifecycleError::TaskPanicked { service } => Some(service),
            LifecycleError::LayerFailed { source, .. } | LifecycleError::Resolution(source) => {
                source.service()
            }
            LifecycleError::CycleDetected { .. } => None,
        }
    }

    /// Innermost orchestration error, skipping layer/retry/resolution wrappers.
    pub fn root_cause(&self) -> &LifecycleError {
        match self {
            LifecycleError::RetriesExhausted { source, .. }
            | LifecycleError::LayerFailed { source, .. }
            | LifecycleError::Resolution(source) => source.root_cause(),
            other => other,
        }
    }
}
