//! Prometheus metrics for the fetch/detect cycle.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

// === Metric Name Constants ===

/// API calls counter metric name (incremented by provider-reported cost).
pub const METRIC_API_CALLS: &str = "odds_api_calls_total";
/// Cache hits counter metric name.
pub const METRIC_CACHE_HITS: &str = "odds_cache_hits_total";
/// Stale-cache serves counter metric name.
pub const METRIC_STALE_SERVED: &str = "odds_cache_stale_served_total";
/// Quota-exhausted counter metric name.
pub const METRIC_QUOTA_EXHAUSTED: &str = "odds_quota_exhausted_total";
/// Normalized records counter metric name.
pub const METRIC_RECORDS_NORMALIZED: &str = "odds_records_normalized_total";
/// Skipped records counter metric name.
pub const METRIC_RECORDS_SKIPPED: &str = "odds_records_skipped_total";
/// Opportunities detected counter metric name.
pub const METRIC_OPPORTUNITIES_DETECTED: &str = "opportunities_detected_total";
/// Upstream fetch latency metric name.
pub const METRIC_FETCH_LATENCY: &str = "odds_fetch_latency_ms";
/// Detection sweep latency metric name.
pub const METRIC_DETECTION_LATENCY: &str = "opportunity_detection_latency_ms";
/// Full refresh cycle latency metric name.
pub const METRIC_CYCLE_LATENCY: &str = "refresh_cycle_latency_ms";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(METRIC_FETCH_LATENCY, "Upstream fetch latency in milliseconds");
    describe_histogram!(
        METRIC_DETECTION_LATENCY,
        "Time to sweep all snapshots for opportunities in milliseconds"
    );
    describe_histogram!(
        METRIC_CYCLE_LATENCY,
        "Full refresh cycle latency in milliseconds"
    );

    describe_counter!(
        METRIC_API_CALLS,
        "Total provider API quota spent (sum of reported call costs)"
    );
    describe_counter!(METRIC_CACHE_HITS, "Total fetches served from fresh cache");
    describe_counter!(
        METRIC_STALE_SERVED,
        "Total fetches degraded to a stale cached payload"
    );
    describe_counter!(
        METRIC_QUOTA_EXHAUSTED,
        "Total fetches denied by the daily quota"
    );
    describe_counter!(
        METRIC_RECORDS_NORMALIZED,
        "Total canonical odds records produced"
    );
    describe_counter!(
        METRIC_RECORDS_SKIPPED,
        "Total malformed records dropped during decode/normalization"
    );
    describe_counter!(
        METRIC_OPPORTUNITIES_DETECTED,
        "Total arbitrage opportunities detected"
    );

    debug!("Metrics initialized");
}

/// Add the provider-reported cost of a completed API call.
pub fn inc_api_calls(cost: u32) {
    counter!(METRIC_API_CALLS).increment(cost as u64);
}

/// Increment the fresh-cache-hit counter.
pub fn inc_cache_hits() {
    counter!(METRIC_CACHE_HITS).increment(1);
}

/// Increment the stale-cache-served counter.
pub fn inc_stale_served() {
    counter!(METRIC_STALE_SERVED).increment(1);
}

/// Increment the quota-exhausted counter.
pub fn inc_quota_exhausted() {
    counter!(METRIC_QUOTA_EXHAUSTED).increment(1);
}

/// Add normalized record count.
pub fn inc_records_normalized(count: u64) {
    counter!(METRIC_RECORDS_NORMALIZED).increment(count);
}

/// Add skipped record count.
pub fn inc_records_skipped(count: u64) {
    counter!(METRIC_RECORDS_SKIPPED).increment(count);
}

/// Increment the opportunities-detected counter.
pub fn inc_opportunities_detected() {
    counter!(METRIC_OPPORTUNITIES_DETECTED).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name).record(latency_ms);
    }
}

/// Create a latency timer for an upstream fetch.
pub fn timer_fetch() -> LatencyTimer {
    LatencyTimer::new(METRIC_FETCH_LATENCY)
}

/// Create a latency timer for a detection sweep.
pub fn timer_detection() -> LatencyTimer {
    LatencyTimer::new(METRIC_DETECTION_LATENCY)
}

/// Create a latency timer for a full refresh cycle.
pub fn timer_cycle() -> LatencyTimer {
    LatencyTimer::new(METRIC_CYCLE_LATENCY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn latency_timer_measures_time() {
        let timer = LatencyTimer::new("test_metric");
        sleep(Duration::from_millis(10));
        let elapsed = timer.elapsed_ms();
        assert!(elapsed >= 9.0); // Allow some tolerance
        // Timer will record on drop
    }
}
