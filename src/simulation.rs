//! Manifest-driven simulated services.
//!
//! Lets operators rehearse a start-up and shutdown from a config file: each
//! `[[services]]` entry becomes a service that sleeps for its configured
//! delays and fails its first `fail_attempts` inits.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::{LifecycleConfig, ServiceSpec};
use crate::error::{BoxError, Result};
use crate::registry::{Hook, HookPhase, Registry};
use crate::service::Service;

/// A stand-in service described by a manifest entry.
#[derive(Debug)]
pub struct SimulatedService {
    spec: ServiceSpec,
    attempts: AtomicU32,
}

impl SimulatedService {
    pub fn new(spec: ServiceSpec) -> Self {
        Self {
            spec,
            attempts: AtomicU32::new(0),
        }
    }

    /// Init attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Service<LifecycleConfig> for SimulatedService {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn priority(&self) -> i32 {
        self.spec.priority
    }

    fn dependencies(&self) -> Vec<String> {
        self.spec.dependencies.clone()
    }

    fn should_init(&self, config: &LifecycleConfig) -> bool {
        config.is_enabled(&self.spec.name)
    }

    async fn init(&self, ctx: &CancellationToken) -> std::result::Result<(), BoxError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::select! {
            _ = ctx.cancelled() => {
                return Err(format!("init of '{}' cancelled", self.spec.name).into());
            }
            _ = tokio::time::sleep(Duration::from_millis(self.spec.init_delay_ms)) => {}
        }

        if attempt <= self.spec.fail_attempts {
            return Err(format!(
                "simulated failure of '{}' on attempt {}",
                self.spec.name, attempt
            )
            .into());
        }
        Ok(())
    }

    async fn close(&self, ctx: &CancellationToken) -> std::result::Result<(), BoxError> {
        tokio::select! {
            _ = ctx.cancelled() => {
                Err(format!("close of '{}' cancelled", self.spec.name).into())
            }
            _ = tokio::time::sleep(Duration::from_millis(self.spec.close_delay_ms)) => Ok(()),
        }
    }
}

/// Register every manifest entry, plus trace hooks around init and close.
pub fn build_registry(config: &LifecycleConfig) -> Result<Registry<LifecycleConfig>> {
    let registry = Registry::new();
    for spec in &config.services {
        let name = spec.name.clone();
        registry.register(Arc::new(SimulatedService::new(spec.clone())))?;

        registry.register_hook(
            &name,
            Hook::new(HookPhase::BeforeInit, 0, |_ctx, service| async move {
                tracing::debug!(service = %service, "Simulated init starting");
                Ok::<(), BoxError>(())
            }),
        );
        registry.register_hook(
            &name,
            Hook::new(HookPhase::AfterClose, 0, |_ctx, service| async move {
                tracing::debug!(service = %service, "Simulated close finished");
                Ok::<(), BoxError>(())
            }),
        );
    }
    Ok(registry)
}
