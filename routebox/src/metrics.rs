//! Metrics declaration and recording helpers.
//!
//! All helpers are no-ops unless the `metrics` feature is enabled.

use std::time::Duration;

use routebox_core::{CacheStatus, ForwardOutcome, HealthProbeResult};

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track number of cache hit events.
    pub static ref CACHE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "routebox_cache_hit_total",
            "Total number of requests served from the cache store."
        );
        "routebox_cache_hit_total"
    };
    /// Track number of cache miss events.
    pub static ref CACHE_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "routebox_cache_miss_total",
            "Total number of requests forwarded upstream."
        );
        "routebox_cache_miss_total"
    };
    /// Track store failures per operation.
    pub static ref STORE_ERROR_COUNTER: &'static str = {
        metrics::describe_counter!(
            "routebox_store_error_total",
            "Total number of failed cache store operations."
        );
        "routebox_store_error_total"
    };
    /// Track forward attempts per outcome.
    pub static ref FORWARD_COUNTER: &'static str = {
        metrics::describe_counter!(
            "routebox_forward_total",
            "Total number of requests forwarded upstream per outcome."
        );
        "routebox_forward_total"
    };
    /// Histogram of upstream call duration.
    pub static ref FORWARD_DURATION: &'static str = {
        metrics::describe_histogram!(
            "routebox_forward_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of upstream optimization calls in seconds."
        );
        "routebox_forward_duration_seconds"
    };
    /// Track failed probes per service.
    pub static ref PROBE_FAILURE_COUNTER: &'static str = {
        metrics::describe_counter!(
            "routebox_probe_failure_total",
            "Total number of failed health probes per service."
        );
        "routebox_probe_failure_total"
    };
}

/// Record the disposition of a handled request.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_cache_status(status: CacheStatus) {
    match status {
        CacheStatus::Hit => metrics::counter!(*CACHE_HIT_COUNTER).increment(1),
        CacheStatus::Miss => metrics::counter!(*CACHE_MISS_COUNTER).increment(1),
    }
}

/// Record the disposition of a handled request (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_cache_status(_status: CacheStatus) {}

/// Record a failed store operation (`read` / `write`).
#[cfg(feature = "metrics")]
#[inline]
pub fn record_store_error(store: &str, operation: &'static str) {
    metrics::counter!(
        *STORE_ERROR_COUNTER,
        "store" => store.to_string(),
        "operation" => operation
    )
    .increment(1);
}

/// Record a failed store operation (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_store_error(_store: &str, _operation: &'static str) {}

/// Record a forward attempt and how long it took.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_forward(outcome: &ForwardOutcome, duration: Duration) {
    metrics::counter!(*FORWARD_COUNTER, "outcome" => outcome.as_str()).increment(1);
    metrics::histogram!(*FORWARD_DURATION, "outcome" => outcome.as_str())
        .record(duration.as_secs_f64());
}

/// Record a forward attempt (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_forward(_outcome: &ForwardOutcome, _duration: Duration) {}

/// Record a probe result; only failures are counted.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_probe(result: &HealthProbeResult) {
    if !result.ok {
        metrics::counter!(
            *PROBE_FAILURE_COUNTER,
            "service" => result.service.clone(),
            "profile" => result.profile.clone().unwrap_or_default()
        )
        .increment(1);
    }
}

/// Record a probe result (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_probe(_result: &HealthProbeResult) {}
