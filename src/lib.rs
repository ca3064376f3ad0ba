//! Service lifecycle orchestration.
//!
//! # Architecture Overview
//!
//! ```text
//!   start-up code                      orchestration
//!   ─────────────                      ─────────────
//!   register(service) ──┐
//!   register_hook(..) ──┼──▶ registry ◀──── lifecycle::ParallelInitializer
//!                       │      │  state machine        │   │
//!                       │      │  + hooks              │   └──▶ resilience
//!                       │      ▼                       │        retry / back-off / deadline
//!                       │   services_to_init(config) ──┘
//!                       │      │
//!                       │      ▼
//!                       └─ dependency::DependencyResolver
//!                             cycle check → layers (Kahn)
//!
//!   cross-cutting: config (TOML), observability (tracing + metrics), error
//! ```
//!
//! A host builds one [`Registry`], registers its services, and hands it to a
//! [`ParallelInitializer`]. `init` starts services layer by layer, each layer
//! concurrently; `close` tears them down in reverse.

// Core
pub mod dependency;
pub mod error;
pub mod registry;
pub mod service;

// Orchestration
pub mod lifecycle;
pub mod resilience;

// Cross-cutting concerns
pub mod config;
pub mod observability;

// Tooling
pub mod simulation;

pub use config::LifecycleConfig;
pub use dependency::{DependencyResolver, ServiceNode};
pub use error::{BoxError, LifecycleError, Result};
pub use lifecycle::{ParallelInitializer, StatsSnapshot};
pub use registry::{Hook, HookPhase, Registry};
pub use service::{Service, ServiceState};
