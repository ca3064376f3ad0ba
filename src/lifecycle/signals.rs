//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for Ctrl-C (and SIGTERM on Unix)
//! - Cancel the root token so in-flight init/close work winds down
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A listener that fails to install logs and never fires; it does not cancel
//! - The listener also stops when the token is cancelled by someone else

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawn a task that cancels `token` on the first shutdown signal.
pub fn shutdown_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = shutdown_signal() => {
                tracing::info!("Shutdown signal received");
                token.cancel();
            }
        }
    })
}

/// Resolve on the first Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
