//! Per-attempt deadline enforcement.
//!
//! # Responsibilities
//! - Run one init attempt as its own task and race it against a deadline
//! - Cancel the attempt's token when the deadline wins
//! - Report what a timed-out attempt eventually did
//!
//! # Design Decisions
//! - Completion is reported through a `oneshot`; a dropped receiver is how the
//!   task learns it finished too late
//! - The task is not aborted on timeout: cancellation is cooperative, so the
//!   orchestrator only stops waiting
//! - Late results are logged and handed to a callback, never returned
//! - No deadline means the attempt runs inline on the caller's task

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{LifecycleError, Result};
use crate::observability::metrics;

/// Run `task` under `deadline`, deriving its token from `parent`.
///
/// `on_late` is called from the background task with the result of an attempt
/// that outlived its deadline.
pub async fn run_with_deadline<F, Fut, L>(
    service: &str,
    parent: &CancellationToken,
    deadline: Option<Duration>,
    task: F,
    on_late: L,
) -> Result<()>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
    L: FnOnce(&Result<()>) + Send + 'static,
{
    let Some(deadline) = deadline else {
        return task(parent.clone()).await;
    };

    let token = parent.child_token();
    let work = task(token.clone());
    let (tx, rx) = oneshot::channel();
    let name = service.to_string();

    tokio::spawn(async move {
        let result = work.await;
        if let Err(late) = tx.send(result) {
            match &late {
                Ok(()) => {
                    tracing::info!(service = %name, "Timed-out service finished init late")
                }
                Err(e) => {
                    tracing::warn!(service = %name, error = %e, "Timed-out service failed late")
                }
            }
            on_late(&late);
        }
    });

    match tokio::time::timeout(deadline, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => {
            tracing::error!(service = %service, "Init task ended without reporting");
            Err(LifecycleError::TaskPanicked {
                service: service.to_string(),
            })
        }
        Err(_) => {
            token.cancel();
            metrics::record_timeout(service);
            tracing::warn!(
                service = %service,
                timeout_ms = deadline.as_millis() as u64,
                "Service init timed out"
            );
            Err(LifecycleError::ServiceTimeout {
                service: service.to_string(),
                timeout: deadline,
            })
        }
    }
}
