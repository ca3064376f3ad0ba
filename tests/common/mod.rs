//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use service_lifecycle::config::InitializerConfig;
use service_lifecycle::{BoxError, ParallelInitializer, Registry, Service};

/// Opaque application config used by the mocks.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    pub disabled: Vec<String>,
}

impl TestConfig {
    pub fn without(names: &[&str]) -> Self {
        Self {
            disabled: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

/// Ordered record of lifecycle events, e.g. `init:db`, `close:api`.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Events starting with `prefix`, prefix stripped.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == event)
    }
}

/// Tracks how many inits are running at once.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Configurable service for orchestration tests.
#[derive(Debug)]
pub struct MockService {
    name: String,
    priority: i32,
    dependencies: Vec<String>,
    init_delay: Duration,
    fail_times: u32,
    close_fails: bool,
    ignores_cancellation: bool,
    attempts: AtomicU32,
    closes: AtomicU32,
    journal: Journal,
    in_flight: InFlight,
}

impl MockService {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            priority: 0,
            dependencies: Vec::new(),
            init_delay: Duration::ZERO,
            fail_times: 0,
            close_fails: false,
            ignores_cancellation: false,
            attempts: AtomicU32::new(0),
            closes: AtomicU32::new(0),
            journal: journal.clone(),
            in_flight: InFlight::default(),
        }
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn init_delay(mut self, millis: u64) -> Self {
        self.init_delay = Duration::from_millis(millis);
        self
    }

    /// Fail the first `times` init attempts.
    pub fn fail_times(mut self, times: u32) -> Self {
        self.fail_times = times;
        self
    }

    pub fn close_fails(mut self) -> Self {
        self.close_fails = true;
        self
    }

    /// Sleep through the whole init delay even when cancelled.
    pub fn ignores_cancellation(mut self) -> Self {
        self.ignores_cancellation = true;
        self
    }

    pub fn tracked_by(mut self, in_flight: &InFlight) -> Self {
        self.in_flight = in_flight.clone();
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    async fn wait(&self, ctx: &CancellationToken) -> Result<(), BoxError> {
        if self.ignores_cancellation {
            tokio::time::sleep(self.init_delay).await;
            return Ok(());
        }
        tokio::select! {
            _ = ctx.cancelled() => Err(format!("{} cancelled", self.name).into()),
            _ = tokio::time::sleep(self.init_delay) => Ok(()),
        }
    }
}

#[async_trait]
impl Service<TestConfig> for MockService {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    fn should_init(&self, config: &TestConfig) -> bool {
        !config.disabled.contains(&self.name)
    }

    async fn init(&self, ctx: &CancellationToken) -> Result<(), BoxError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.in_flight.enter();
        let waited = self.wait(ctx).await;
        self.in_flight.exit();
        waited?;

        if attempt <= self.fail_times {
            self.journal.push(format!("fail:{}", self.name));
            return Err(format!("{} failed on attempt {}", self.name, attempt).into());
        }
        self.journal.push(format!("init:{}", self.name));
        Ok(())
    }

    async fn close(&self, _ctx: &CancellationToken) -> Result<(), BoxError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.close_fails {
            return Err(format!("{} refused to close", self.name).into());
        }
        self.journal.push(format!("close:{}", self.name));
        Ok(())
    }
}

/// Build a registry holding `services`, in order.
pub fn registry_with(services: &[Arc<MockService>]) -> Arc<Registry<TestConfig>> {
    let registry = Registry::new();
    for service in services {
        registry.register(service.clone()).unwrap();
    }
    Arc::new(registry)
}

/// Initializer with no deadline and no retries unless overridden.
pub fn initializer(
    registry: &Arc<Registry<TestConfig>>,
    tweak: impl FnOnce(&mut InitializerConfig),
) -> ParallelInitializer<TestConfig> {
    let mut config = InitializerConfig {
        timeout_ms: 0,
        retry_count: 0,
        retry_interval_ms: 10,
        ..Default::default()
    };
    tweak(&mut config);
    ParallelInitializer::new(Arc::clone(registry), config)
}
