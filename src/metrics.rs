//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Login Metrics
    pub static ref LOGINS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("skillsfront_logins_total", "Authorization code callbacks by outcome"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref SESSIONS_ACTIVE: IntGauge = IntGauge::new(
        "skillsfront_sessions_active",
        "Sessions currently held in the session store"
    ).expect("metric can be created");

    // Upstream Metrics
    pub static ref UPSTREAM_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("skillsfront_upstream_requests_total", "Outbound calls to the provider and resource server"),
        &["target", "outcome"]
    ).expect("metric can be created");
    pub static ref UPSTREAM_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "skillsfront_upstream_request_duration_seconds",
            "Outbound call duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["target"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("skillsfront_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(LOGINS_TOTAL.clone()))
            .expect("LOGINS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SESSIONS_ACTIVE.clone()))
            .expect("SESSIONS_ACTIVE can be registered");
        REGISTRY
            .register(Box::new(UPSTREAM_REQUESTS_TOTAL.clone()))
            .expect("UPSTREAM_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(UPSTREAM_REQUEST_DURATION_SECONDS.clone()))
            .expect("UPSTREAM_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Record the outcome of one outbound call.
pub(crate) fn record_upstream(target: &'static str, outcome: &'static str) {
    UPSTREAM_REQUESTS_TOTAL
        .with_label_values(&[target, outcome])
        .inc();
}
