//! Dependency resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Active services (registry snapshot)
//!     → node.rs (name, priority, dependencies)
//!     → resolver.rs
//!         validate_dependencies → warnings only
//!         detect_cycle          → fail fast
//!         resolve               → [[layer 0], [layer 1], ...]
//! ```
//!
//! # Design Decisions
//! - Recomputed every run from the services that are active for that run
//! - Dependencies on inactive services are satisfied by definition

pub mod node;
pub mod resolver;

pub use node::ServiceNode;
pub use resolver::DependencyResolver;
