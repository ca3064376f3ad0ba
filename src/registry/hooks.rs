//! Lifecycle hooks.
//!
//! # Responsibilities
//! - Describe a callback attached to one phase of one service
//! - Box arbitrary async closures behind a cloneable handle
//!
//! # Design Decisions
//! - Hooks are cheap to clone (shared `Arc` callback) so the registry can
//!   snapshot them and run them without holding its lock
//! - Ordering is ascending priority; equal priorities keep registration order

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::BoxError;

/// Lifecycle transition a hook is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    BeforeInit,
    AfterInit,
    BeforeClose,
    AfterClose,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HookPhase::BeforeInit => "before_init",
            HookPhase::AfterInit => "after_init",
            HookPhase::BeforeClose => "before_close",
            HookPhase::AfterClose => "after_close",
        };
        f.write_str(label)
    }
}

/// Boxed hook callback: `(ctx, service_name) -> Result`.
pub type HookFn =
    Arc<dyn Fn(CancellationToken, String) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// A side-effecting callback run on a lifecycle transition.
#[derive(Clone)]
pub struct Hook {
    /// Phase this hook runs in.
    pub phase: HookPhase,
    /// Execution order within the phase (ascending).
    pub priority: i32,
    func: HookFn,
}

impl Hook {
    /// Create a hook from an async closure.
    pub fn new<F, Fut>(phase: HookPhase, priority: i32, f: F) -> Self
    where
        F: Fn(CancellationToken, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let func: HookFn = Arc::new(
            move |ctx: CancellationToken, name: String| -> BoxFuture<'static, Result<(), BoxError>> {
                Box::pin(f(ctx, name))
            },
        );
        Self {
            phase,
            priority,
            func,
        }
    }

    /// Invoke the callback for `service`.
    pub async fn run(&self, ctx: &CancellationToken, service: &str) -> Result<(), BoxError> {
        (self.func)(ctx.clone(), service.to_string()).await
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("phase", &self.phase)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Return the hooks for `phase` in execution order.
///
/// Works on a private copy; the caller's list is never reordered.
pub fn ordered_for_phase(hooks: &[Hook], phase: HookPhase) -> Vec<Hook> {
    let mut ordered = hooks.to_vec();
    // Stable: equal priorities run in registration order.
    ordered.sort_by_key(|hook| hook.priority);
    ordered.retain(|hook| hook.phase == phase);
    ordered
}
