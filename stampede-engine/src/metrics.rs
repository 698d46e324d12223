//! Built-in metric names and a tag-aware recorder

use stampede_metrics::{MetricKind, MetricsRegistry, Tags};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const HTTP_REQS: &str = "http_reqs";
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const TRANSPORT_ERRORS: &str = "transport_errors";

pub const ITERATIONS: &str = "iterations";
pub const ITERATION_DURATION: &str = "iteration_duration";
pub const DROPPED_ITERATIONS: &str = "dropped_iterations";
pub const INTERRUPTED_ITERATIONS: &str = "interrupted_iterations";
pub const VUS_ALLOCATED: &str = "vus_allocated";

pub const QUEUE_ENTRY_SUCCESS_RATE: &str = "queue_entry_success_rate";
pub const QUEUE_ENTRY_FAILURES: &str = "queue_entry_failures";
pub const QUEUE_ENTRY_DURATION: &str = "queue_entry_duration";

pub const ACTIVATION_WAIT_TIME: &str = "activation_wait_time";
pub const ACTIVATION_TIMEOUTS: &str = "activation_timeouts";
pub const ACTIVE_USAGE_TIME: &str = "active_usage_time";
pub const QUEUE_REMOVAL_SUCCESS: &str = "queue_removal_success";
pub const QUEUE_REMOVAL_FAILURES: &str = "queue_removal_failures";

pub const BOOKING_SUCCESS_RATE: &str = "booking_success_rate";
pub const BOOKING_DURATION: &str = "booking_duration";
pub const E2E_TOTAL_DURATION: &str = "e2e_total_duration";
pub const SEATS_QUERY_FAILURES: &str = "seats_query_failures";
pub const SEATS_UNAVAILABLE: &str = "seats_unavailable";
pub const RESERVATION_FAILURES: &str = "reservation_failures";
pub const PAYMENT_FAILURES: &str = "payment_failures";

pub const VALIDATION_DURATION: &str = "validation_duration";
pub const VALIDATION_SUCCESS_RATE: &str = "validation_success_rate";
pub const VALIDATION_FAILURES: &str = "validation_failures";

/// Every built-in metric with its kind
pub const BUILTIN: &[(&str, MetricKind)] = &[
    (HTTP_REQS, MetricKind::Counter),
    (HTTP_REQ_DURATION, MetricKind::Distribution),
    (HTTP_REQ_FAILED, MetricKind::Rate),
    (TRANSPORT_ERRORS, MetricKind::Counter),
    (ITERATIONS, MetricKind::Counter),
    (ITERATION_DURATION, MetricKind::Distribution),
    (DROPPED_ITERATIONS, MetricKind::Counter),
    (INTERRUPTED_ITERATIONS, MetricKind::Counter),
    (VUS_ALLOCATED, MetricKind::Counter),
    (QUEUE_ENTRY_SUCCESS_RATE, MetricKind::Rate),
    (QUEUE_ENTRY_FAILURES, MetricKind::Counter),
    (QUEUE_ENTRY_DURATION, MetricKind::Distribution),
    (ACTIVATION_WAIT_TIME, MetricKind::Distribution),
    (ACTIVATION_TIMEOUTS, MetricKind::Counter),
    (ACTIVE_USAGE_TIME, MetricKind::Distribution),
    (QUEUE_REMOVAL_SUCCESS, MetricKind::Rate),
    (QUEUE_REMOVAL_FAILURES, MetricKind::Counter),
    (BOOKING_SUCCESS_RATE, MetricKind::Rate),
    (BOOKING_DURATION, MetricKind::Distribution),
    (E2E_TOTAL_DURATION, MetricKind::Distribution),
    (SEATS_QUERY_FAILURES, MetricKind::Counter),
    (SEATS_UNAVAILABLE, MetricKind::Counter),
    (RESERVATION_FAILURES, MetricKind::Counter),
    (PAYMENT_FAILURES, MetricKind::Counter),
    (VALIDATION_DURATION, MetricKind::Distribution),
    (VALIDATION_SUCCESS_RATE, MetricKind::Rate),
    (VALIDATION_FAILURES, MetricKind::Counter),
];

/// Fix the kind of every built-in metric so empty counters read as 0
pub fn declare_builtin(registry: &MetricsRegistry) -> Result<(), stampede_metrics::MetricsError> {
    for (name, kind) in BUILTIN {
        registry.declare(name, *kind)?;
    }
    Ok(())
}

pub fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Records into a registry with a fixed base tag set
///
/// Recording failures are programming errors (a kind clash); they are
/// logged rather than propagated so a session never aborts over metrics.
#[derive(Debug, Clone)]
pub struct Recorder {
    registry: Arc<MetricsRegistry>,
    tags: Tags,
}

impl Recorder {
    pub fn new(registry: Arc<MetricsRegistry>, tags: Tags) -> Self {
        Self { registry, tags }
    }

    /// Base tags plus `step`
    pub fn step_tags(&self, step: &str) -> Tags {
        self.tags.clone().with("step", step)
    }

    pub fn count(&self, name: &str) {
        self.count_tagged(name, &self.tags);
    }

    pub fn count_tagged(&self, name: &str, tags: &Tags) {
        if let Err(e) = self.registry.add_counter(name, tags, 1.0) {
            warn!(metric = name, error = %e, "failed to record counter");
        }
    }

    pub fn add(&self, name: &str, delta: f64) {
        if let Err(e) = self.registry.add_counter(name, &self.tags, delta) {
            warn!(metric = name, error = %e, "failed to record counter");
        }
    }

    pub fn rate(&self, name: &str, success: bool) {
        self.rate_tagged(name, &self.tags, success);
    }

    pub fn rate_tagged(&self, name: &str, tags: &Tags, success: bool) {
        if let Err(e) = self.registry.add_rate(name, tags, success) {
            warn!(metric = name, error = %e, "failed to record rate");
        }
    }

    pub fn trend(&self, name: &str, duration: Duration) {
        self.trend_tagged(name, &self.tags, duration);
    }

    pub fn trend_tagged(&self, name: &str, tags: &Tags, duration: Duration) {
        if let Err(e) = self.registry.add_distribution(name, tags, millis(duration)) {
            warn!(metric = name, error = %e, "failed to record distribution");
        }
    }
}
