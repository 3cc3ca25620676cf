//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Doublons metrics
pub const METRICS_PREFIX: &str = "doublons";

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

    // Scan metrics
    describe_counter!(
        format!("{}_scans_total", METRICS_PREFIX),
        Unit::Count,
        "Total duplicate scan jobs started"
    );

    describe_histogram!(
        format!("{}_scan_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Duplicate scan duration in seconds"
    );

    describe_gauge!(
        format!("{}_scan_groups_found", METRICS_PREFIX),
        Unit::Count,
        "Groups found by the last completed scan"
    );

    // Merge metrics
    describe_counter!(
        format!("{}_merges_total", METRICS_PREFIX),
        Unit::Count,
        "Total merge requests executed"
    );

    describe_counter!(
        format!("{}_records_merged_total", METRICS_PREFIX),
        Unit::Count,
        "Total student records collapsed into a master"
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

/// Helper to record scan metrics
pub fn record_scan(duration_secs: f64, found_count: u64, outcome: &str) {
    counter!(
        format!("{}_scans_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_scan_duration_seconds", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .record(duration_secs);

    gauge!(format!("{}_scan_groups_found", METRICS_PREFIX)).set(found_count as f64);
}

/// Helper to record merge metrics
pub fn record_merge(merged_count: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_merges_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        counter!(format!("{}_records_merged_total", METRICS_PREFIX))
            .increment(merged_count as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("POST", "/doublons/merge/advanced");
        std::thread::sleep(std::time::Duration::from_millis(5));
        metrics.finish(200);
        // Just verify it runs without panic
    }

    #[test]
    fn test_record_helpers() {
        record_scan(1.25, 3, "completed");
        record_merge(2, true);
        record_merge(0, false);
    }
}
