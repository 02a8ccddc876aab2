//! Metrics and observability utilities
//!
//! Prometheus-style metrics for the question pipeline with standardized
//! naming conventions. Recording goes through the `metrics` facade, so these
//! helpers are no-ops until a recorder is installed by the binary.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Fundscope metrics
pub const METRICS_PREFIX: &str = "fundscope";

/// Histogram buckets for end-to-end question latency (in seconds).
/// Dominated by the narrative call, so the upper range matters.
pub const QUERY_BUCKETS: &[f64] = &[
    0.010, // 10ms, warm cache without narrative
    0.050,
    0.100,
    0.250,
    0.500,
    1.000,
    2.500,
    5.000,
    10.00,
    30.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
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

    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total questions answered, by query type and outcome"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end question latency in seconds"
    );

    describe_counter!(
        format!("{}_context_fetches_total", METRICS_PREFIX),
        Unit::Count,
        "Data context fetches against the tabular store, by outcome"
    );

    describe_histogram!(
        format!("{}_context_fetch_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Time to fetch all six collections"
    );

    describe_gauge!(
        format!("{}_context_records", METRICS_PREFIX),
        Unit::Count,
        "Records held in the cached data context, by collection"
    );

    describe_counter!(
        format!("{}_narrative_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Narrative generation calls that failed and fell back to insights"
    );

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

/// Helper to record a finished question
pub fn record_query(duration_secs: f64, query_type: &str, outcome: &str) {
    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "type" => query_type.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        "type" => query_type.to_string()
    )
    .record(duration_secs);
}

/// Helper to record a context fetch
pub fn record_context_fetch(duration_secs: f64, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_context_fetches_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    if success {
        histogram!(format!("{}_context_fetch_duration_seconds", METRICS_PREFIX))
            .record(duration_secs);
    }
}

/// Helper to publish the size of each cached collection
pub fn record_context_sizes(sizes: &[(&str, usize)]) {
    for (collection, count) in sizes {
        gauge!(
            format!("{}_context_records", METRICS_PREFIX),
            "collection" => collection.to_string()
        )
        .set(*count as f64);
    }
}

/// Helper to record a narrative failure
pub fn record_narrative_failure(stage: &str) {
    counter!(
        format!("{}_narrative_failures_total", METRICS_PREFIX),
        "stage" => stage.to_string()
    )
    .increment(1);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in QUERY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recording_without_recorder() {
        let metrics = RequestMetrics::start("POST", "/v1/ask");
        metrics.finish(200);
        record_query(0.2, "funder_analysis", "success");
        record_context_fetch(0.1, true);
        record_context_sizes(&[("funders", 3)]);
        record_narrative_failure("compose");
        record_cache(false, "data_context");
    }
}
