//! Lifecycle orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (initializer.rs):
//!     Registry → active subset → layers → concurrent init per layer
//!
//! Shutdown (initializer.rs):
//!     layers reversed → concurrent close per layer → first error reported
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → cancel the root token
//! ```
//!
//! # Design Decisions
//! - Strict barrier between layers during init
//! - Shutdown is best effort: every layer is attempted
//! - One root `CancellationToken` per run; deadlines and layers use child tokens

pub mod initializer;
pub mod signals;
pub mod stats;

pub use initializer::ParallelInitializer;
pub use signals::shutdown_on_ctrl_c;
pub use stats::{LifecycleStats, StatsSnapshot};
