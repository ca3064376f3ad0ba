//! Service registry.
//!
//! # Responsibilities
//! - Own registered services, their hooks and their lifecycle state
//! - Drive the per-service init/close state machines
//! - Provide the only mutation surface for state
//!
//! # Design Decisions
//! - One `RwLock` guards services, hooks and states together
//! - The lock is never held across an `.await`; services and hooks are
//!   cloned out (`Arc`) before they run
//! - "Check state and mark Initializing" is a single write-locked step so two
//!   concurrent inits of one service cannot both pass the guard

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{LifecycleError, Result};
use crate::observability::metrics;
use crate::registry::hooks::{ordered_for_phase, Hook, HookPhase};
use crate::service::{Service, ServiceState};

/// Shared handle to a registered service.
pub type ServiceRef<C> = Arc<dyn Service<C>>;

struct RegistryInner<C> {
    /// Registration order is preserved.
    services: IndexMap<String, ServiceRef<C>>,
    hooks: HashMap<String, Vec<Hook>>,
    states: HashMap<String, ServiceState>,
}

/// Outcome of the atomic init guard.
enum InitGate<C> {
    AlreadyReady,
    Proceed(ServiceRef<C>),
}

/// Table of registered services and their lifecycle state.
///
/// Construct one at start-up, share it via `Arc`, and hand it to a
/// [`ParallelInitializer`](crate::lifecycle::ParallelInitializer).
pub struct Registry<C> {
    inner: RwLock<RegistryInner<C>>,
}

impl<C> Registry<C>
where
    C: Send + Sync + 'static,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                services: IndexMap::new(),
                hooks: HashMap::new(),
                states: HashMap::new(),
            }),
        }
    }

    /// Register a service in state `Uninitialized`.
    ///
    /// Fails if the name is taken; the existing service is kept.
    pub fn register(&self, service: ServiceRef<C>) -> Result<()> {
        let name = service.name().to_string();
        let mut inner = self.inner.write();

        if inner.services.contains_key(&name) {
            tracing::warn!(service = %name, "Rejected duplicate service registration");
            return Err(LifecycleError::DuplicateRegistration(name));
        }

        tracing::debug!(
            service = %name,
            priority = service.priority(),
            dependencies = ?service.dependencies(),
            "Service registered"
        );
        inner.states.insert(name.clone(), ServiceState::Uninitialized);
        inner.services.insert(name, service);
        Ok(())
    }

    /// Attach a hook to `name`. The service does not need to exist yet.
    pub fn register_hook(&self, name: &str, hook: Hook) {
        let mut inner = self.inner.write();
        inner.hooks.entry(name.to_string()).or_default().push(hook);
    }

    /// Look up a registered service.
    pub fn get_service(&self, name: &str) -> Option<ServiceRef<C>> {
        self.inner.read().services.get(name).cloned()
    }

    /// Current state of `name`; unknown names report `Uninitialized`.
    pub fn state(&self, name: &str) -> ServiceState {
        self.inner
            .read()
            .states
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    /// Overwrite the state of `name`.
    pub fn set_state(&self, name: &str, state: ServiceState) {
        let previous = self.inner.write().states.insert(name.to_string(), state);
        tracing::debug!(
            service = %name,
            from = %previous.unwrap_or_default(),
            to = %state,
            "Service state changed"
        );
        metrics::record_state(name, state);
    }

    /// Snapshot of every state, in registration order.
    pub fn states(&self) -> Vec<(String, ServiceState)> {
        let inner = self.inner.read();
        inner
            .services
            .keys()
            .map(|name| {
                let state = inner.states.get(name).copied().unwrap_or_default();
                (name.clone(), state)
            })
            .collect()
    }

    /// Registered names in registration order.
    pub fn service_names(&self) -> Vec<String> {
        self.inner.read().services.keys().cloned().collect()
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.inner.read().services.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered services whose `should_init(config)` is true, in registration order.
    ///
    /// `should_init` runs after the lock is released, so it may call back
    /// into the registry.
    pub fn services_to_init(&self, config: &C) -> Vec<ServiceRef<C>> {
        let services: Vec<ServiceRef<C>> = self.inner.read().services.values().cloned().collect();
        services
            .into_iter()
            .filter(|service| service.should_init(config))
            .collect()
    }

    /// Run every `phase` hook of `name` in ascending priority.
    ///
    /// Stops at the first failing hook.
    pub async fn execute_hooks(
        &self,
        ctx: &CancellationToken,
        name: &str,
        phase: HookPhase,
    ) -> Result<()> {
        let hooks = {
            let inner = self.inner.read();
            match inner.hooks.get(name) {
                Some(hooks) => ordered_for_phase(hooks, phase),
                None => return Ok(()),
            }
        };

        for hook in hooks {
            hook.run(ctx, name)
                .await
                .map_err(|source| LifecycleError::HookFailure {
                    service: name.to_string(),
                    phase,
                    source,
                })?;
        }
        Ok(())
    }

    /// Initialize `name`: hooks, `Service::init`, hooks, then `Ready`.
    ///
    /// A `Ready` service is a no-op. A service already `Initializing` is rejected.
    pub async fn init_service(&self, ctx: &CancellationToken, name: &str) -> Result<()> {
        let service = match self.begin_init(name)? {
            InitGate::AlreadyReady => {
                tracing::debug!(service = %name, "Service already ready, skipping init");
                return Ok(());
            }
            InitGate::Proceed(service) => service,
        };

        if let Err(e) = self.execute_hooks(ctx, name, HookPhase::BeforeInit).await {
            tracing::error!(service = %name, error = %e, "Before-init hook failed");
            self.set_state(name, ServiceState::Failed);
            return Err(e);
        }

        if let Err(source) = service.init(ctx).await {
            tracing::error!(service = %name, error = %source, "Service init failed");
            self.set_state(name, ServiceState::Failed);
            return Err(LifecycleError::ServiceInitFailure {
                service: name.to_string(),
                source,
            });
        }

        if let Err(e) = self.execute_hooks(ctx, name, HookPhase::AfterInit).await {
            tracing::error!(service = %name, error = %e, "After-init hook failed");
            self.set_state(name, ServiceState::Failed);
            return Err(e);
        }

        self.set_state(name, ServiceState::Ready);
        Ok(())
    }

    /// Close `name` if it is `Ready`; anything else is a no-op.
    ///
    /// Close hook failures are logged only. A failing `Service::close` is
    /// returned and leaves the state at `Ready`.
    pub async fn close_service(&self, ctx: &CancellationToken, name: &str) -> Result<()> {
        let service = {
            let inner = self.inner.read();
            let state = inner.states.get(name).copied().unwrap_or_default();
            if state != ServiceState::Ready {
                tracing::debug!(service = %name, state = %state, "Service not ready, nothing to close");
                return Ok(());
            }
            match inner.services.get(name) {
                Some(service) => Arc::clone(service),
                None => return Err(LifecycleError::UnknownService(name.to_string())),
            }
        };

        if let Err(e) = self.execute_hooks(ctx, name, HookPhase::BeforeClose).await {
            tracing::warn!(service = %name, error = %e, "Before-close hook failed, continuing");
        }

        if let Err(source) = service.close(ctx).await {
            tracing::error!(service = %name, error = %source, "Service close failed");
            metrics::record_close(name, "failure");
            return Err(LifecycleError::ServiceCloseFailure {
                service: name.to_string(),
                source,
            });
        }

        if let Err(e) = self.execute_hooks(ctx, name, HookPhase::AfterClose).await {
            tracing::warn!(service = %name, error = %e, "After-close hook failed, continuing");
        }

        self.set_state(name, ServiceState::Closed);
        metrics::record_close(name, "success");
        tracing::info!(service = %name, "Service closed");
        Ok(())
    }

    /// Check the state and mark `Initializing` under one write lock.
    fn begin_init(&self, name: &str) -> Result<InitGate<C>> {
        let mut inner = self.inner.write();
        let service = inner
            .services
            .get(name)
            .cloned()
            .ok_or_else(|| LifecycleError::UnknownService(name.to_string()))?;

        match inner.states.get(name).copied().unwrap_or_default() {
            ServiceState::Ready => return Ok(InitGate::AlreadyReady),
            ServiceState::Initializing => {
                return Err(LifecycleError::AlreadyInitializing(name.to_string()))
            }
            _ => {}
        }

        inner
            .states
            .insert(name.to_string(), ServiceState::Initializing);
        drop(inner);

        metrics::record_state(name, ServiceState::Initializing);
        tracing::debug!(service = %name, "Service initializing");
        Ok(InitGate::Proceed(service))
    }
}

impl<C> Default for Registry<C>
where
    C: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Registry")
            .field("services", &inner.services.keys().collect::<Vec<_>>())
            .field("states", &inner.states)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Weak;
    use std::time::Duration;

    struct Probe {
        name: &'static str,
        priority: i32,
        fail_init: bool,
        fail_close: bool,
        init_delay: Duration,
        init_calls: Arc<AtomicU32>,
        close_calls: Arc<AtomicU32>,
    }

    impl Probe {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                priority: 0,
                fail_init: false,
                fail_close: false,
                init_delay: Duration::ZERO,
                init_calls: Arc::new(AtomicU32::new(0)),
                close_calls: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    #[async_trait]
    impl Service<()> for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn init(&self, _ctx: &CancellationToken) -> Result<(), BoxError> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            if !self.init_delay.is_zero() {
                tokio::time::sleep(self.init_delay).await;
            }
            if self.fail_init {
                return Err("init exploded".into());
            }
            Ok(())
        }

        async fn close(&self, _ctx: &CancellationToken) -> Result<(), BoxError> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err("close exploded".into());
            }
            Ok(())
        }
    }

    fn recording_hook(
        journal: &Arc<Mutex<Vec<String>>>,
        phase: HookPhase,
        priority: i32,
        label: &'static str,
    ) -> Hook {
        let journal = Arc::clone(journal);
        Hook::new(phase, priority, move |_ctx, _name| {
            let journal = Arc::clone(&journal);
            async move {
                journal.lock().push(label.to_string());
                Ok::<(), BoxError>(())
            }
        })
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let registry = Registry::<()>::new();
        let mut first = Probe::new("x");
        first.priority = 1;
        let mut second = Probe::new("x");
        second.priority = 99;

        assert!(registry.register(Arc::new(first)).is_ok());
        let err = registry.register(Arc::new(second)).unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateRegistration(ref n) if n == "x"));

        let kept = registry.get_service("x").unwrap();
        assert_eq!(kept.priority(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_state_defaults_to_uninitialized() {
        let registry = Registry::<()>::new();
        assert_eq!(registry.state("ghost"), ServiceState::Uninitialized);
    }

    #[tokio::test]
    async fn test_init_runs_hooks_in_priority_order() {
        let registry = Registry::<()>::new();
        registry.register(Arc::new(Probe::new("db"))).unwrap();

        let journal = Arc::new(Mutex::new(Vec::new()));
        registry.register_hook("db", recording_hook(&journal, HookPhase::AfterInit, 0, "after"));
        registry.register_hook("db", recording_hook(&journal, HookPhase::BeforeInit, 20, "before-20"));
        registry.register_hook("db", recording_hook(&journal, HookPhase::BeforeInit, -1, "before--1"));
        registry.register_hook("db", recording_hook(&journal, HookPhase::BeforeClose, 0, "close"));

        let ctx = CancellationToken::new();
        registry.init_service(&ctx, "db").await.unwrap();

        assert_eq!(registry.state("db"), ServiceState::Ready);
        assert_eq!(*journal.lock(), vec!["before--1", "before-20", "after"]);
    }

    #[tokio::test]
    async fn test_init_ready_service_is_noop() {
        let registry = Registry::<()>::new();
        let probe = Probe::new("db");
        let calls = Arc::clone(&probe.init_calls);
        registry.register(Arc::new(probe)).unwrap();

        let ctx = CancellationToken::new();
        registry.init_service(&ctx, "db").await.unwrap();
        registry.init_service(&ctx, "db").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_init_rejects_concurrent_attempt() {
        let registry = Registry::<()>::new();
        registry.register(Arc::new(Probe::new("db"))).unwrap();
        registry.set_state("db", ServiceState::Initializing);

        let ctx = CancellationToken::new();
        let err = registry.init_service(&ctx, "db").await.unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyInitializing(_)));
    }

    #[tokio::test]
    async fn test_hook_failure_marks_failed_and_skips_init() {
        let registry = Registry::<()>::new();
        let probe = Probe::new("db");
        let calls = Arc::clone(&probe.init_calls);
        registry.register(Arc::new(probe)).unwrap();
        registry.register_hook(
            "db",
            Hook::new(HookPhase::BeforeInit, 0, |_ctx, _name| async {
                Err::<(), BoxError>("migrations missing".into())
            }),
        );

        let ctx = CancellationToken::new();
        let err = registry.init_service(&ctx, "db").await.unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::HookFailure { phase: HookPhase::BeforeInit, .. }
        ));
        assert_eq!(registry.state("db"), ServiceState::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_init_failure_marks_failed() {
        let registry = Registry::<()>::new();
        let mut probe = Probe::new("db");
        probe.fail_init = true;
        registry.register(Arc::new(probe)).unwrap();

        let ctx = CancellationToken::new();
        let err = registry.init_service(&ctx, "db").await.unwrap_err();
        assert!(matches!(err, LifecycleError::ServiceInitFailure { .. }));
        assert_eq!(registry.state("db"), ServiceState::Failed);
    }

    #[tokio::test]
    async fn test_close_uninitialized_is_noop() {
        let registry = Registry::<()>::new();
        let probe = Probe::new("db");
        let closes = Arc::clone(&probe.close_calls);
        registry.register(Arc::new(probe)).unwrap();

        let ctx = CancellationToken::new();
        registry.close_service(&ctx, "db").await.unwrap();

        assert_eq!(closes.load(Ordering::SeqCst), 0);
        assert_eq!(registry.state("db"), ServiceState::Uninitialized);
    }

    #[tokio::test]
    async fn test_close_hook_failure_does_not_block_close() {
        let registry = Registry::<()>::new();
        let probe = Probe::new("db");
        let closes = Arc::clone(&probe.close_calls);
        registry.register(Arc::new(probe)).unwrap();
        registry.register_hook(
            "db",
            Hook::new(HookPhase::BeforeClose, 0, |_ctx, _name| async {
                Err::<(), BoxError>("flush failed".into())
            }),
        );

        let ctx = CancellationToken::new();
        registry.init_service(&ctx, "db").await.unwrap();
        registry.close_service(&ctx, "db").await.unwrap();

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(registry.state("db"), ServiceState::Closed);
    }

    #[tokio::test]
    async fn test_close_failure_leaves_ready() {
        let registry = Registry::<()>::new();
        let mut probe = Probe::new("db");
        probe.fail_close = true;
        registry.register(Arc::new(probe)).unwrap();

        let ctx = CancellationToken::new();
        registry.init_service(&ctx, "db").await.unwrap();
        let err = registry.close_service(&ctx, "db").await.unwrap_err();

        assert!(matches!(err, LifecycleError::ServiceCloseFailure { .. }));
        assert_eq!(registry.state("db"), ServiceState::Ready);
    }

    #[test]
    fn test_services_to_init_filters_and_keeps_order() {
        struct Gated(&'static str, bool);

        #[async_trait]
        impl Service<bool> for Gated {
            fn name(&self) -> &str {
                self.0
            }
            fn should_init(&self, enable_optional: &bool) -> bool {
                !self.1 || *enable_optional
            }
            async fn init(&self, _ctx: &CancellationToken) -> Result<(), BoxError> {
                Ok(())
            }
            async fn close(&self, _ctx: &CancellationToken) -> Result<(), BoxError> {
                Ok(())
            }
        }

        let registry = Registry::<bool>::new();
        registry.register(Arc::new(Gated("c", false))).unwrap();
        registry.register(Arc::new(Gated("a", true))).unwrap();
        registry.register(Arc::new(Gated("b", false))).unwrap();

        let names = |enabled: bool| -> Vec<String> {
            registry
                .services_to_init(&enabled)
                .iter()
                .map(|s| s.name().to_string())
                .collect()
        };
        assert_eq!(names(false), vec!["c", "b"]);
        assert_eq!(names(true), vec!["c", "a", "b"]);
    }

    fn failing_hook(phase: HookPhase, priority: i32, message: &'static str) -> Hook {
        Hook::new(phase, priority, move |_ctx, _name| async move {
            Err::<(), BoxError>(message.into())
        })
    }

    #[tokio::test]
    async fn test_after_init_hook_failure_marks_failed() {
        let registry = Registry::<()>::new();
        let probe = Probe::new("db");
        let calls = Arc::clone(&probe.init_calls);
        registry.register(Arc::new(probe)).unwrap();
        registry.register_hook("db", failing_hook(HookPhase::AfterInit, 0, "warm-up failed"));

        let ctx = CancellationToken::new();
        let err = registry.init_service(&ctx, "db").await.unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::HookFailure { phase: HookPhase::AfterInit, .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.state("db"), ServiceState::Failed);
    }

    #[tokio::test]
    async fn test_after_close_hook_failure_still_closes() {
        let registry = Registry::<()>::new();
        let probe = Probe::new("db");
        let closes = Arc::clone(&probe.close_calls);
        registry.register(Arc::new(probe)).unwrap();
        registry.register_hook("db", failing_hook(HookPhase::AfterClose, 0, "audit log down"));

        let ctx = CancellationToken::new();
        registry.init_service(&ctx, "db").await.unwrap();
        registry.close_service(&ctx, "db").await.unwrap();

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(registry.state("db"), ServiceState::Closed);
    }

    #[tokio::test]
    async fn test_first_hook_error_skips_remaining_hooks() {
        let registry = Registry::<()>::new();
        registry.register(Arc::new(Probe::new("db"))).unwrap();

        let journal = Arc::new(Mutex::new(Vec::new()));
        registry.register_hook("db", recording_hook(&journal, HookPhase::BeforeInit, 10, "late"));
        registry.register_hook("db", failing_hook(HookPhase::BeforeInit, 5, "schema check failed"));
        registry.register_hook("db", recording_hook(&journal, HookPhase::BeforeInit, 0, "early"));

        let ctx = CancellationToken::new();
        let err = registry
            .execute_hooks(&ctx, "db", HookPhase::BeforeInit)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::HookFailure { phase: HookPhase::BeforeInit, ref service, .. } if service == "db"
        ));
        assert_eq!(*journal.lock(), vec!["early"]);
    }

    #[tokio::test]
    async fn test_concurrent_init_lets_exactly_one_through() {
        let registry = Registry::<()>::new();
        let mut probe = Probe::new("db");
        probe.init_delay = Duration::from_millis(100);
        let calls = Arc::clone(&probe.init_calls);
        registry.register(Arc::new(probe)).unwrap();

        let ctx = CancellationToken::new();
        let (first, second) = tokio::join!(
            registry.init_service(&ctx, "db"),
            registry.init_service(&ctx, "db")
        );

        let results = [first, second];
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(LifecycleError::AlreadyInitializing(_))))
            .count();
        assert_eq!(succeeded, 1);
        assert_eq!(rejected, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.state("db"), ServiceState::Ready);
    }

    /// Config that lets a service reach back into its own registry.
    struct Backref(Weak<Registry<Backref>>);

    struct SelfDemoting(&'static str);

    #[async_trait]
    impl Service<Backref> for SelfDemoting {
        fn name(&self) -> &str {
            self.0
        }
        fn should_init(&self, config: &Backref) -> bool {
            match config.0.upgrade() {
                Some(registry) => {
                    registry.set_state(self.0, ServiceState::Failed);
                    false
                }
                None => true,
            }
        }
        async fn init(&self, _ctx: &CancellationToken) -> Result<(), BoxError> {
            Ok(())
        }
        async fn close(&self, _ctx: &CancellationToken) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn test_should_init_may_write_to_registry() {
        let registry = Arc::new(Registry::<Backref>::new());
        registry.register(Arc::new(SelfDemoting("db"))).unwrap();
        let config = Backref(Arc::downgrade(&registry));

        assert!(registry.services_to_init(&config).is_empty());
        assert_eq!(registry.state("db"), ServiceState::Failed);
    }
}
