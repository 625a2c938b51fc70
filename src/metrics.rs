//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialsync_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");

    // Platform API Metrics
    pub static ref PLATFORM_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialsync_platform_requests_total", "Total number of platform API requests"),
        &["endpoint", "outcome"]
    ).expect("metric can be created");
    pub static ref PLATFORM_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "socialsync_platform_request_duration_seconds",
            "Platform API request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["endpoint"]
    ).expect("metric can be created");
    pub static ref RATE_LIMITED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialsync_rate_limited_total", "Total number of 429 answers from the platform"),
        &["endpoint"]
    ).expect("metric can be created");

    // Sync Metrics
    pub static ref SYNC_RUNS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialsync_sync_runs_total", "Total number of sync runs"),
        &["platform", "strategy", "status"]
    ).expect("metric can be created");
    pub static ref POSTS_INGESTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialsync_posts_ingested_total", "Posts handed to the content store"),
        &["platform", "result"]
    ).expect("metric can be created");

    // OAuth Metrics
    pub static ref TOKEN_REFRESH_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialsync_token_refresh_total", "Total number of OAuth token refreshes"),
        &["status"]
    ).expect("metric can be created");
    pub static ref OAUTH_FLOWS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialsync_oauth_flows_total", "OAuth authorization flow steps"),
        &["stage", "status"]
    ).expect("metric can be created");
    pub static ref OAUTH_PENDING_STATES: IntGauge = IntGauge::new(
        "socialsync_oauth_pending_states",
        "Authorization attempts waiting for their callback"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialsync_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("HTTP_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(PLATFORM_REQUESTS_TOTAL.clone()))
        .expect("PLATFORM_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(PLATFORM_REQUEST_DURATION_SECONDS.clone()))
        .expect("PLATFORM_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(RATE_LIMITED_TOTAL.clone()))
        .expect("RATE_LIMITED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SYNC_RUNS_TOTAL.clone()))
        .expect("SYNC_RUNS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(POSTS_INGESTED_TOTAL.clone()))
        .expect("POSTS_INGESTED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(TOKEN_REFRESH_TOTAL.clone()))
        .expect("TOKEN_REFRESH_TOTAL can be registered");
    REGISTRY
        .register(Box::new(OAUTH_FLOWS_TOTAL.clone()))
        .expect("OAUTH_FLOWS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(OAUTH_PENDING_STATES.clone()))
        .expect("OAUTH_PENDING_STATES can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Record one platform API call
pub fn observe_platform_request(endpoint: &str, outcome: &str, elapsed: std::time::Duration) {
    PLATFORM_REQUESTS_TOTAL
        .with_label_values(&[endpoint, outcome])
        .inc();
    PLATFORM_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint])
        .observe(elapsed.as_secs_f64());
}
