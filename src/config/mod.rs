//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → LifecycleConfig (validated, immutable)
//!         initializer   → ParallelInitializer
//!         observability → logging bootstrap
//!         services      → simulation / planning
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The orchestrator itself is generic over the application's config type;
//!   `LifecycleConfig` is only what this crate needs to run

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{BackoffStrategy, InitializerConfig, LifecycleConfig, ObservabilityConfig, ServiceSpec};
pub use validation::{validate_config, ValidationError};
