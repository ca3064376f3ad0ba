//! Layered parallel initialization and reverse-order shutdown.
//!
//! # Responsibilities
//! - Pick the services relevant to this run and resolve their layers
//! - Initialize each layer concurrently, behind a barrier between layers
//! - Apply the concurrency limit, per-attempt deadline and retry policy
//! - Close layers in reverse, carrying on past failures
//!
//! # Data Flow
//! ```text
//! init(ctx, config)
//!     → Registry::services_to_init(config)
//!     → DependencyResolver (warn on missing deps, fail on cycles)
//!     → for each layer: init_layer
//!         → per service: semaphore permit → init_service_with_retry
//!             → init_service_with_timeout → Registry::init_service
//!
//! close(ctx, config)
//!     → layers reversed (registration order if resolution fails)
//!     → per layer: Registry::close_service for every member at once
//! ```
//!
//! # Design Decisions
//! - The first failing layer ends `init`; earlier layers stay `Ready`
//! - Within a layer the first error cancels the layer token, then the layer
//!   still waits for every task before returning
//! - The semaphore lives for one `init_layer` call only
//! - `close` never stops early and reports the first error at the end

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::InitializerConfig;
use crate::dependency::DependencyResolver;
use crate::error::{LifecycleError, Result};
use crate::lifecycle::stats::{LifecycleStats, StatsSnapshot};
use crate::observability::metrics;
use crate::registry::{Registry, ServiceRef};
use crate::resilience::{run_with_deadline, RetryPolicy};

/// Drives a [`Registry`] through layered init and close.
pub struct ParallelInitializer<C> {
    registry: Arc<Registry<C>>,
    config: InitializerConfig,
    retry: RetryPolicy,
    stats: Arc<LifecycleStats>,
}

impl<C> Clone for ParallelInitializer<C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            retry: self.retry.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<C> ParallelInitializer<C>
where
    C: Send + Sync + 'static,
{
    /// Create an initializer over `registry`.
    pub fn new(registry: Arc<Registry<C>>, config: InitializerConfig) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            registry,
            config,
            retry,
            stats: Arc::new(LifecycleStats::default()),
        }
    }

    /// Replace the retry policy derived from the configuration.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &Arc<Registry<C>> {
        &self.registry
    }

    pub fn config(&self) -> &InitializerConfig {
        &self.config
    }

    /// Counters accumulated over every run of this initializer (and its clones).
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Initialize every service whose `should_init(config)` holds, layer by layer.
    pub async fn init(&self, ctx: &CancellationToken, config: &C) -> Result<()> {
        let span = tracing::info_span!("lifecycle_init", run_id = %Uuid::new_v4());
        self.run_init(ctx, config).instrument(span).await
    }

    /// Close every relevant service, most dependent layer first.
    pub async fn close(&self, ctx: &CancellationToken, config: &C) -> Result<()> {
        let span = tracing::info_span!("lifecycle_close", run_id = %Uuid::new_v4());
        self.run_close(ctx, config).instrument(span).await
    }

    async fn run_init(&self, ctx: &CancellationToken, config: &C) -> Result<()> {
        let services = self.registry.services_to_init(config);
        if services.is_empty() {
            tracing::info!("No services to initialize");
            return Ok(());
        }

        let resolver = DependencyResolver::new(&services);
        warn_missing(&resolver);
        let layers = resolver
            .resolve()
            .map_err(|e| LifecycleError::Resolution(Box::new(e)))?;

        tracing::info!(
            services = services.len(),
            layers = layers.len(),
            "Initializing services"
        );

        let started = Instant::now();
        for (index, layer) in layers.iter().enumerate() {
            let layer_started = Instant::now();
            tracing::info!(layer = index, services = ?layer, "Starting init layer");

            let result = self.init_layer(ctx, layer).await;
            metrics::record_layer("init", index, layer_started);

            if let Err(e) = result {
                tracing::error!(layer = index, error = %e, "Init layer failed, aborting startup");
                return Err(LifecycleError::LayerFailed {
                    layer: index,
                    source: Box::new(e),
                });
            }
        }

        tracing::info!(
            services = services.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "All services initialized"
        );
        Ok(())
    }

    /// Initialize one layer. Members run concurrently, bounded by `max_concurrency`.
    pub async fn init_layer(&self, ctx: &CancellationToken, names: &[String]) -> Result<()> {
        match names {
            [] => return Ok(()),
            [name] => return self.init_service_with_retry(ctx, name).await,
            _ => {}
        }

        let layer_token = ctx.child_token();
        // Anything above the semaphore's ceiling is unbounded in practice.
        let limit = self.config.max_concurrency.min(Semaphore::MAX_PERMITS);
        let limiter = (limit > 0).then(|| Arc::new(Semaphore::new(limit)));

        let mut tasks = FuturesUnordered::new();
        for name in names {
            let this = self.clone();
            let token = layer_token.clone();
            let limiter = limiter.clone();
            let service = name.clone();

            let handle = tokio::spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => tokio::select! {
                        _ = token.cancelled() => {
                            return Err(LifecycleError::Cancelled { service });
                        }
                        permit = limiter.acquire_owned() => match permit {
                            Ok(permit) => Some(permit),
                            Err(_) => return Err(LifecycleError::Cancelled { service }),
                        },
                    },
                    None => None,
                };
                this.init_service_with_retry(&token, &service).await
            });

            let name = name.clone();
            tasks.push(async move { (name, handle.await) });
        }

        let mut first_error = None;
        while let Some((name, joined)) = tasks.next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(service = %name, error = %e, "Init task panicked");
                    Err(LifecycleError::TaskPanicked {
                        service: name.clone(),
                    })
                }
            };

            if let Err(e) = result {
                if first_error.is_none() {
                    layer_token.cancel();
                    first_error = Some(e);
                } else {
                    tracing::debug!(service = %name, error = %e, "Further failure in layer");
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Initialize `name`, retrying failed attempts per the retry policy.
    pub async fn init_service_with_retry(&self, ctx: &CancellationToken, name: &str) -> Result<()> {
        let max_attempts = self.retry.max_attempts();
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.retry.delay_before(attempt);
                self.stats.record_retry();
                metrics::record_retry(name);
                tracing::warn!(
                    service = %name,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying service init"
                );
                tokio::time::sleep(delay).await;
            }

            if ctx.is_cancelled() {
                tracing::info!(service = %name, "Init cancelled before attempt");
                return Err(LifecycleError::Cancelled {
                    service: name.to_string(),
                });
            }

            self.stats.record_attempt();
            let started = Instant::now();
            match self.init_service_with_timeout(ctx, name).await {
                Ok(()) => {
                    metrics::record_init(name, "success", started);
                    tracing::info!(
                        service = %name,
                        attempt = attempt + 1,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Service ready"
                    );
                    return Ok(());
                }
                Err(e) => {
                    metrics::record_init(name, "failure", started);
                    if !RetryPolicy::is_retryable(&e) {
                        return Err(e);
                    }
                    tracing::warn!(
                        service = %name,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "Service init attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(source) => {
                tracing::error!(service = %name, attempts = max_attempts, "Service init failed");
                Err(LifecycleError::RetriesExhausted {
                    service: name.to_string(),
                    attempts: max_attempts,
                    source: Box::new(source),
                })
            }
            None => Ok(()),
        }
    }

    /// One init attempt for `name`, bounded by the configured timeout.
    pub async fn init_service_with_timeout(
        &self,
        ctx: &CancellationToken,
        name: &str,
    ) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let stats = Arc::clone(&self.stats);
        let service = name.to_string();

        let result = run_with_deadline(
            name,
            ctx,
            self.config.timeout(),
            move |token| async move { registry.init_service(&token, &service).await },
            move |_late| stats.record_late_result(),
        )
        .await;

        if matches!(result, Err(LifecycleError::ServiceTimeout { .. })) {
            self.stats.record_timeout();
        }
        result
    }

    async fn run_close(&self, ctx: &CancellationToken, config: &C) -> Result<()> {
        let services = self.registry.services_to_init(config);
        if services.is_empty() {
            tracing::info!("No services to close");
            return Ok(());
        }

        let layers = match DependencyResolver::new(&services).resolve() {
            Ok(layers) => layers,
            Err(e) => {
                tracing::warn!(error = %e, "Dependency resolution failed, closing in registration order");
                return self.close_in_registration_order(ctx, &services).await;
            }
        };

        tracing::info!(
            services = services.len(),
            layers = layers.len(),
            "Closing services"
        );

        let mut first_error = None;
        for (index, layer) in layers.iter().enumerate().rev() {
            let layer_started = Instant::now();
            tracing::info!(layer = index, services = ?layer, "Closing layer");

            let result = self.close_layer(ctx, layer).await;
            metrics::record_layer("close", index, layer_started);

            if let Err(e) = result {
                tracing::error!(layer = index, error = %e, "Close layer failed, continuing");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Close every member of a layer at once; returns the first failure.
    async fn close_layer(&self, ctx: &CancellationToken, names: &[String]) -> Result<()> {
        let results = join_all(
            names
                .iter()
                .map(|name| self.registry.close_service(ctx, name)),
        )
        .await;

        let mut first_error = None;
        for result in results {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn close_in_registration_order(
        &self,
        ctx: &CancellationToken,
        services: &[ServiceRef<C>],
    ) -> Result<()> {
        let mut first_error = None;
        for service in services {
            if let Err(e) = self.registry.close_service(ctx, service.name()).await {
                tracing::error!(service = %service.name(), error = %e, "Close failed, continuing");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn warn_missing(resolver: &DependencyResolver) {
    for (service, missing) in resolver.validate_dependencies() {
        let warning = LifecycleError::MissingDependency { service, missing };
        tracing::warn!(error = %warning, "Treating missing dependencies as satisfied");
    }
}
