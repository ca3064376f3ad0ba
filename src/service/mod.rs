//! Service capability and lifecycle state.
//!
//! # State Machine
//! ```text
//! Uninitialized → Initializing → Ready → Closed
//!                      ↓
//!                   Failed → Initializing (retry)
//! ```
//!
//! # Design Decisions
//! - Services are trait objects; the orchestrator never knows what a service does
//! - The configuration type is a generic parameter, consulted only by `should_init`
//! - State lives in the registry, not in the service value

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::BoxError;

/// A named component that can be initialized and closed by the orchestrator.
///
/// `C` is the application's configuration type. The orchestrator passes it to
/// [`Service::should_init`] and never inspects it otherwise.
#[async_trait]
pub trait Service<C>
where
    Self: Send + Sync + 'static,
{
    /// Unique name of the service.
    fn name(&self) -> &str;

    /// Ordering hint within a layer (lower first). Never overrides dependencies.
    fn priority(&self) -> i32 {
        0
    }

    /// Names of the services that must be ready before this one.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether this service takes part in the current run.
    fn should_init(&self, _config: &C) -> bool {
        true
    }

    /// Bring the service up. Implementations should watch `ctx` for cancellation.
    async fn init(&self, ctx: &CancellationToken) -> Result<(), BoxError>;

    /// Tear the service down.
    async fn close(&self, ctx: &CancellationToken) -> Result<(), BoxError>;
}

/// Lifecycle state of a registered service.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    #[default]
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    Failed = 3,
    Closed = 4,
}

impl ServiceState {
    /// Lower-case label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Uninitialized => "uninitialized",
            ServiceState::Initializing => "initializing",
            ServiceState::Ready => "ready",
            ServiceState::Failed => "failed",
            ServiceState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
