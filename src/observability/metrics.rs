//! Metrics collection.
//!
//! # Metrics
//! - `lifecycle_service_init_total` (counter): init attempts by service, outcome
//! - `lifecycle_service_init_duration_seconds` (histogram): attempt latency
//! - `lifecycle_service_retries_total` (counter): retries by service
//! - `lifecycle_service_timeouts_total` (counter): deadline expiries by service
//! - `lifecycle_service_close_total` (counter): closes by service, outcome
//! - `lifecycle_service_state` (gauge): current state as its discriminant
//! - `lifecycle_layer_duration_seconds` (histogram): wall time per layer and phase
//!
//! # Design Decisions
//! - Thin wrappers so call sites stay one line
//! - Labels are service names and short outcome strings only

use std::time::Instant;

use crate::service::ServiceState;

/// Record one init attempt.
pub fn record_init(service: &str, outcome: &'static str, started: Instant) {
    ::metrics::counter!(
        "lifecycle_service_init_total",
        "service" => service.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!(
        "lifecycle_service_init_duration_seconds",
        "service" => service.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}

/// Record a retry about to happen.
pub fn record_retry(service: &str) {
    ::metrics::counter!("lifecycle_service_retries_total", "service" => service.to_string())
        .increment(1);
}

/// Record an expired per-service deadline.
pub fn record_timeout(service: &str) {
    ::metrics::counter!("lifecycle_service_timeouts_total", "service" => service.to_string())
        .increment(1);
}

/// Record a close outcome.
pub fn record_close(service: &str, outcome: &'static str) {
    ::metrics::counter!(
        "lifecycle_service_close_total",
        "service" => service.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Publish the current state of a service.
pub fn record_state(service: &str, state: ServiceState) {
    ::metrics::gauge!("lifecycle_service_state", "service" => service.to_string())
        .set(f64::from(state as u8));
}

/// Record how long one layer took.
pub fn record_layer(phase: &'static str, layer: usize, started: Instant) {
    ::metrics::histogram!(
        "lifecycle_layer_duration_seconds",
        "phase" => phase,
        "layer" => layer.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}
