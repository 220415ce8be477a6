//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all MSA Board metrics
pub const METRICS_PREFIX: &str = "msaboard";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 500ms (backend fetch included)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms - P50 target
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms - P99 target
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s - backend timeout
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Bucketing metrics
    describe_histogram!(
        format!("{}_bucket_build_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Time spent grouping documents into MSA buckets"
    );

    describe_gauge!(
        format!("{}_buckets_count", METRICS_PREFIX),
        Unit::Count,
        "Number of MSA buckets in the last build"
    );

    describe_gauge!(
        format!("{}_unlinked_documents_count", METRICS_PREFIX),
        Unit::Count,
        "Documents without an MSA number in the last build"
    );

    describe_gauge!(
        format!("{}_expiring_buckets_count", METRICS_PREFIX),
        Unit::Count,
        "Buckets whose agreement expires within the threshold"
    );

    // Backend metrics
    describe_counter!(
        format!("{}_backend_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total document backend requests"
    );

    describe_histogram!(
        format!("{}_backend_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document backend latency in seconds"
    );

    describe_counter!(
        format!("{}_backend_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total document backend errors"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    describe_counter!(
        format!("{}_cache_invalidations_total", METRICS_PREFIX),
        Unit::Count,
        "Cache entries removed after document mutations"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record a bucket build
pub fn record_bucket_build(duration_secs: f64, buckets: usize, unlinked: usize, expiring: usize) {
    histogram!(format!("{}_bucket_build_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    gauge!(format!("{}_buckets_count", METRICS_PREFIX)).set(buckets as f64);
    gauge!(format!("{}_unlinked_documents_count", METRICS_PREFIX)).set(unlinked as f64);
    gauge!(format!("{}_expiring_buckets_count", METRICS_PREFIX)).set(expiring as f64);
}

/// Helper to record document backend calls
pub fn record_backend(duration_secs: f64, operation: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_backend_requests_total", METRICS_PREFIX),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_backend_duration_seconds", METRICS_PREFIX),
            "operation" => operation.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_backend_errors_total", METRICS_PREFIX),
            "operation" => operation.to_string()
        )
        .increment(1);
    }
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

/// Helper to record cache invalidations
pub fn record_invalidation(removed: usize, cache_name: &str) {
    counter!(
        format!("{}_cache_invalidations_total", METRICS_PREFIX),
        "cache" => cache_name.to_string()
    )
    .increment(removed as u64);
}
