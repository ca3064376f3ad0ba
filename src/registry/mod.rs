//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! Start-up code:
//!     register(service) → store.rs (state = Uninitialized)
//!     register_hook(name, hook) → hooks.rs
//!
//! Orchestrator:
//!     services_to_init(config) → snapshot for the resolver
//!     init_service / close_service → state machine + hooks
//! ```
//!
//! # Design Decisions
//! - Explicit instance, no global singleton; tests build fresh registries
//! - Hooks are sorted on a private copy, never under a read guard

pub mod hooks;
pub mod store;

pub use hooks::{Hook, HookFn, HookPhase};
pub use store::{Registry, ServiceRef};
