//! Prometheus Metrics Module
//!
//! Provides cache-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Dispatch events processed by event name and outcome
//! - Dispatch processing latency histograms
//! - Cached entity gauges by kind
//! - REST fetches by route and outcome
//! - Evictions by kind

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Dispatch counter - tracks gateway events by name and outcome
pub static DISPATCH_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dispatch_events_total", "Total number of gateway dispatch events")
            .namespace("discord_state"),
        &["event", "outcome"], // "ok", "ignored", "malformed", "failed"
    )
    .expect("Failed to create DISPATCH_EVENTS_TOTAL metric")
});

/// Dispatch latency histogram - tracks processing duration in seconds
pub static DISPATCH_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0];
    HistogramVec::new(
        HistogramOpts::new(
            "dispatch_duration_seconds",
            "Gateway dispatch processing latency in seconds",
        )
        .namespace("discord_state")
        .buckets(buckets),
        &["event"],
    )
    .expect("Failed to create DISPATCH_DURATION_SECONDS metric")
});

/// Cached entities gauge
pub static CACHED_ENTITIES: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("cached_entities", "Number of entities held by each broker")
            .namespace("discord_state"),
        &["kind"],
    )
    .expect("Failed to create CACHED_ENTITIES metric")
});

/// REST fetch counter
pub static REST_FETCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("rest_fetches_total", "Total number of REST cache-miss fetches")
            .namespace("discord_state"),
        &["route", "outcome"],
    )
    .expect("Failed to create REST_FETCHES_TOTAL metric")
});

/// Eviction counter
pub static EVICTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("evictions_total", "Total number of evicted entities").namespace("discord_state"),
        &["kind"],
    )
    .expect("Failed to create EVICTIONS_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(DISPATCH_EVENTS_TOTAL.clone()))
        .expect("Failed to register DISPATCH_EVENTS_TOTAL");
    registry
        .register(Box::new(DISPATCH_DURATION_SECONDS.clone()))
        .expect("Failed to register DISPATCH_DURATION_SECONDS");
    registry
        .register(Box::new(CACHED_ENTITIES.clone()))
        .expect("Failed to register CACHED_ENTITIES");
    registry
        .register(Box::new(REST_FETCHES_TOTAL.clone()))
        .expect("Failed to register REST_FETCHES_TOTAL");
    registry
        .register(Box::new(EVICTIONS_TOTAL.clone()))
        .expect("Failed to register EVICTIONS_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record one processed dispatch event
pub fn record_dispatch(event: &str, outcome: &str, duration_secs: f64) {
    DISPATCH_EVENTS_TOTAL
        .with_label_values(&[event, outcome])
        .inc();
    DISPATCH_DURATION_SECONDS
        .with_label_values(&[event])
        .observe(duration_secs);
}

/// Helper to update a broker's entity count
pub fn set_cached_entities(kind: &str, count: usize) {
    CACHED_ENTITIES
        .with_label_values(&[kind])
        .set(count as i64);
}

/// Helper to record a REST fetch
pub fn record_rest_fetch(route: &str, outcome: &str) {
    REST_FETCHES_TOTAL
        .with_label_values(&[route, outcome])
        .inc();
}

/// Helper to record evictions
pub fn record_evictions(kind: &str, count: usize) {
    EVICTIONS_TOTAL
        .with_label_values(&[kind])
        .inc_by(count as u64);
}
