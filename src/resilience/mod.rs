//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! One service init:
//!     → retries.rs (attempt loop, delay before each retry)
//!         → backoff.rs (exponential delay with jitter, when configured)
//!     → timeouts.rs (race the attempt against its deadline)
//! ```
//!
//! # Design Decisions
//! - A deadline only stops the waiting; the service sees a cancelled token
//! - Retry delays are slept in full, even during shutdown
//! - Cancellation of the root token is checked before every attempt and is final

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::RetryPolicy;
pub use timeouts::run_with_deadline;
