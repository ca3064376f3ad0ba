//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Registry / resolver / initializer produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Whatever metrics recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - Every `Init`/`Close` run carries a `run_id` span field
//! - The library never installs a metrics recorder; without one the
//!   `metrics` macros are no-ops

pub mod logging;
pub mod metrics;
