//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations so the positioning tick never
//! contends with the reporter. Reporting swaps the interval counters.
//!
//! All atomics use Relaxed ordering; they are statistical counters only and
//! must not drive coordination or logic decisions.

use crate::domain::types::PositionSource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Prometheus-style exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Number of distinct position sources tracked
const NUM_SOURCES: usize = 6;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

#[inline]
fn source_index(source: PositionSource) -> usize {
    match source {
        PositionSource::Qr => 0,
        PositionSource::VisualLandmark => 1,
        PositionSource::DeadReckoning => 2,
        PositionSource::Manual => 3,
        PositionSource::RailSnap => 4,
        PositionSource::Simulated => 5,
    }
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Positioning ticks run (monotonic)
    ticks_total: AtomicU64,
    /// Route searches run (monotonic)
    searches_total: AtomicU64,
    /// Route searches that found nothing (monotonic)
    searches_empty_total: AtomicU64,
    /// Searches since last report (reset on report)
    searches_since_report: AtomicU64,
    /// Sum of search latencies (reset on report)
    search_latency_sum_us: AtomicU64,
    /// Max search latency (reset on report)
    search_latency_max_us: AtomicU64,
    /// Search latency histogram (reset on report)
    search_latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Nodes expanded by A* (monotonic)
    nodes_expanded_total: AtomicU64,
    /// Reroutes attempted (monotonic)
    reroutes_total: AtomicU64,
    /// Arrivals (monotonic)
    arrivals_total: AtomicU64,
    /// Accepted position updates per source (monotonic)
    position_updates: [AtomicU64; NUM_SOURCES],
    /// Visual landmark matches dropped below threshold (monotonic)
    landmarks_rejected_total: AtomicU64,
    /// Heading corrections counted by the pipeline (monotonic)
    heading_corrections_total: AtomicU64,
    /// "Consider manual mode" advisories emitted (monotonic)
    manual_advisories_total: AtomicU64,
    /// Automatic Smart -> Assisted downgrades (monotonic)
    mode_downgrades_total: AtomicU64,
    /// Last report time (only accessed from reporter, not atomic)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            ticks_total: AtomicU64::new(0),
            searches_total: AtomicU64::new(0),
            searches_empty_total: AtomicU64::new(0),
            searches_since_report: AtomicU64::new(0),
            search_latency_sum_us: AtomicU64::new(0),
            search_latency_max_us: AtomicU64::new(0),
            search_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            nodes_expanded_total: AtomicU64::new(0),
            reroutes_total: AtomicU64::new(0),
            arrivals_total: AtomicU64::new(0),
            position_updates: std::array::from_fn(|_| AtomicU64::new(0)),
            landmarks_rejected_total: AtomicU64::new(0),
            heading_corrections_total: AtomicU64::new(0),
            manual_advisories_total: AtomicU64::new(0),
            mode_downgrades_total: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_tick(&self) {
        self.ticks_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished route search (lock-free)
    #[inline]
    pub fn record_search(&self, latency_us: u64, nodes_expanded: usize, found: bool) {
        self.searches_total.fetch_add(1, Ordering::Relaxed);
        self.searches_since_report.fetch_add(1, Ordering::Relaxed);
        self.search_latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.nodes_expanded_total.fetch_add(nodes_expanded as u64, Ordering::Relaxed);
        if !found {
            self.searches_empty_total.fetch_add(1, Ordering::Relaxed);
        }

        let bucket = bucket_index(latency_us);
        self.search_latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);

        update_atomic_max(&self.search_latency_max_us, latency_us);
    }

    #[inline]
    pub fn record_reroute(&self) {
        self.reroutes_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_arrival(&self) {
        self.arrivals_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_position_update(&self, source: PositionSource) {
        self.position_updates[source_index(source)].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_landmark_rejected(&self) {
        self.landmarks_rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_heading_correction(&self) {
        self.heading_corrections_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_manual_advisory(&self) {
        self.manual_advisories_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_mode_downgrade(&self) {
        self.mode_downgrades_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ticks_total(&self) -> u64 {
        self.ticks_total.load(Ordering::Relaxed)
    }

    pub fn searches_total(&self) -> u64 {
        self.searches_total.load(Ordering::Relaxed)
    }

    pub fn reroutes_total(&self) -> u64 {
        self.reroutes_total.load(Ordering::Relaxed)
    }

    pub fn position_updates(&self, source: PositionSource) -> u64 {
        self.position_updates[source_index(source)].load(Ordering::Relaxed)
    }

    pub fn landmarks_rejected_total(&self) -> u64 {
        self.landmarks_rejected_total.load(Ordering::Relaxed)
    }

    pub fn manual_advisories_total(&self) -> u64 {
        self.manual_advisories_total.load(Ordering::Relaxed)
    }

    /// Calculate and return metrics summary, then reset periodic counters
    pub fn report(&self) -> MetricsSummary {
        let search_count = self.searches_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.search_latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.search_latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.search_latency_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let searches_per_sec = if elapsed.as_secs_f64() > 0.0 {
            search_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let avg_latency = if search_count > 0 { latency_sum / search_count } else { 0 };

        let mut updates_by_source = [0u64; NUM_SOURCES];
        for (i, counter) in self.position_updates.iter().enumerate() {
            updates_by_source[i] = counter.load(Ordering::Relaxed);
        }

        MetricsSummary {
            ticks_total: self.ticks_total.load(Ordering::Relaxed),
            searches_total: self.searches_total.load(Ordering::Relaxed),
            searches_empty_total: self.searches_empty_total.load(Ordering::Relaxed),
            searches_per_sec,
            search_avg_latency_us: avg_latency,
            search_max_latency_us: max_latency,
            search_lat_buckets: lat_buckets,
            search_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            search_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            nodes_expanded_total: self.nodes_expanded_total.load(Ordering::Relaxed),
            reroutes_total: self.reroutes_total.load(Ordering::Relaxed),
            arrivals_total: self.arrivals_total.load(Ordering::Relaxed),
            updates_by_source,
            landmarks_rejected_total: self.landmarks_rejected_total.load(Ordering::Relaxed),
            heading_corrections_total: self.heading_corrections_total.load(Ordering::Relaxed),
            manual_advisories_total: self.manual_advisories_total.load(Ordering::Relaxed),
            mode_downgrades_total: self.mode_downgrades_total.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics summary for logging
#[derive(Debug)]
pub struct MetricsSummary {
    pub ticks_total: u64,
    pub searches_total: u64,
    pub searches_empty_total: u64,
    pub searches_per_sec: f64,
    pub search_avg_latency_us: u64,
    pub search_max_latency_us: u64,
    pub search_lat_buckets: [u64; NUM_BUCKETS],
    pub search_p50_us: u64,
    pub search_p99_us: u64,
    pub nodes_expanded_total: u64,
    pub reroutes_total: u64,
    pub arrivals_total: u64,
    /// Indexed qr, landmark, dead reckoning, manual, rail snap, simulated
    pub updates_by_source: [u64; NUM_SOURCES],
    pub landmarks_rejected_total: u64,
    pub heading_corrections_total: u64,
    pub manual_advisories_total: u64,
    pub mode_downgrades_total: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            ticks = %self.ticks_total,
            searches = %self.searches_total,
            searches_empty = %self.searches_empty_total,
            searches_per_sec = format!("{:.1}", self.searches_per_sec),
            search_avg_us = %self.search_avg_latency_us,
            search_max_us = %self.search_max_latency_us,
            search_p99_us = %self.search_p99_us,
            reroutes = %self.reroutes_total,
            arrivals = %self.arrivals_total,
            qr = %self.updates_by_source[0],
            landmark = %self.updates_by_source[1],
            dead_reckoning = %self.updates_by_source[2],
            landmarks_rejected = %self.landmarks_rejected_total,
            corrections = %self.heading_corrections_total,
            manual_advisories = %self.manual_advisories_total,
            mode_downgrades = %self.mode_downgrades_total,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(50), 0);
        assert_eq!(bucket_index(100), 0);
        assert_eq!(bucket_index(101), 1);
        assert_eq!(bucket_index(1_000_000), NUM_BUCKETS - 1);
    }

    #[test]
    fn test_record_search() {
        let metrics = Metrics::new();
        metrics.record_search(100, 10, true);
        metrics.record_search(300, 5, false);

        let summary = metrics.report();
        assert_eq!(summary.searches_total, 2);
        assert_eq!(summary.searches_empty_total, 1);
        assert_eq!(summary.search_avg_latency_us, 200);
        assert_eq!(summary.search_max_latency_us, 300);
        assert_eq!(summary.nodes_expanded_total, 15);

        // Interval counters reset, monotonic ones do not
        let again = metrics.report();
        assert_eq!(again.search_avg_latency_us, 0);
        assert_eq!(again.searches_total, 2);
    }

    #[test]
    fn test_position_updates_by_source() {
        let metrics = Metrics::new();
        metrics.record_position_update(PositionSource::Qr);
        metrics.record_position_update(PositionSource::Qr);
        metrics.record_position_update(PositionSource::DeadReckoning);

        assert_eq!(metrics.position_updates(PositionSource::Qr), 2);
        assert_eq!(metrics.position_updates(PositionSource::DeadReckoning), 1);
        assert_eq!(metrics.position_updates(PositionSource::Manual), 0);
    }

    #[test]
    fn test_percentile_from_buckets() {
        let mut buckets = [0u64; NUM_BUCKETS];
        buckets[0] = 90;
        buckets[5] = 10;
        assert_eq!(percentile_from_buckets(&buckets, 0.50), 100);
        assert_eq!(percentile_from_buckets(&buckets, 0.99), 3200);
        assert_eq!(percentile_from_buckets(&[0; NUM_BUCKETS], 0.99), 0);
    }
}
