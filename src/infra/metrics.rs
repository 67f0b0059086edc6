//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Prometheus-style exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
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
fn load_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    std::array::from_fn(|i| buckets[i].load(Ordering::Relaxed))
}

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

    // Last bucket reports 2x the previous bound
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

/// Corridor occupancy values for the Prometheus gauge
pub const OCCUPANCY_IDLE: u64 = 0;
pub const OCCUPANCY_ENTERING: u64 = 1;
pub const OCCUPANCY_TRAVERSING: u64 = 2;
pub const OCCUPANCY_EXITING: u64 = 3;

/// Lock-free metrics collector
///
/// All recording operations are lock-free using atomics.
/// The `report()` method atomically swaps the periodic counters for the log
/// reporter; `snapshot()` reads the all-time counters and resets nothing.
pub struct Metrics {
    /// Total ticks ever run (monotonic)
    ticks_total: AtomicU64,
    /// Ticks since last report (reset on report)
    ticks_since_report: AtomicU64,
    /// Sum of tick latencies in microseconds (reset on report)
    tick_latency_sum_us: AtomicU64,
    /// Max tick latency in microseconds (reset on report)
    tick_latency_max_us: AtomicU64,
    /// Tick latency histogram buckets (reset on report)
    tick_latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// All-time latency sum, max and histogram (never reset)
    tick_latency_sum_total_us: AtomicU64,
    tick_latency_max_total_us: AtomicU64,
    tick_latency_buckets_total: [AtomicU64; NUM_BUCKETS],
    /// Completed correct-direction transits, anomalous ones included (monotonic)
    passes_total: AtomicU64,
    /// Transits over the speed limit (monotonic)
    speeders_total: AtomicU64,
    /// Transits too fast to measure (monotonic)
    anomalies_total: AtomicU64,
    /// Objects that turned around inside the corridor (monotonic)
    reversals_total: AtomicU64,
    blockage_warnings_total: AtomicU64,
    hallway_warnings_total: AtomicU64,
    /// Statistics windows closed (monotonic)
    stats_flushes_total: AtomicU64,
    /// Samples not retained because a window was full (monotonic)
    samples_dropped: AtomicU64,
    sensor_errors_total: AtomicU64,
    indicator_errors_total: AtomicU64,
    liveness_errors_total: AtomicU64,
    /// Sink records dropped because the channel was full (monotonic)
    sink_records_dropped: AtomicU64,
    /// Sink records the writer failed to persist (monotonic)
    sink_write_errors: AtomicU64,
    /// Current corridor occupancy (see OCCUPANCY_*)
    occupancy: AtomicU64,
    /// Last report time (only accessed from reporter, not atomic)
    last_report_time: parking_lot::Mutex<Instant>,
    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            ticks_total: AtomicU64::new(0),
            ticks_since_report: AtomicU64::new(0),
            tick_latency_sum_us: AtomicU64::new(0),
            tick_latency_max_us: AtomicU64::new(0),
            tick_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            tick_latency_sum_total_us: AtomicU64::new(0),
            tick_latency_max_total_us: AtomicU64::new(0),
            tick_latency_buckets_total: std::array::from_fn(|_| AtomicU64::new(0)),
            passes_total: AtomicU64::new(0),
            speeders_total: AtomicU64::new(0),
            anomalies_total: AtomicU64::new(0),
            reversals_total: AtomicU64::new(0),
            blockage_warnings_total: AtomicU64::new(0),
            hallway_warnings_total: AtomicU64::new(0),
            stats_flushes_total: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
            sensor_errors_total: AtomicU64::new(0),
            indicator_errors_total: AtomicU64::new(0),
            liveness_errors_total: AtomicU64::new(0),
            sink_records_dropped: AtomicU64::new(0),
            sink_write_errors: AtomicU64::new(0),
            occupancy: AtomicU64::new(OCCUPANCY_IDLE),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
            started_at: Instant::now(),
        }
    }

    /// Record a tick was run with given latency (lock-free)
    #[inline]
    pub fn record_tick(&self, latency_us: u64) {
        self.ticks_total.fetch_add(1, Ordering::Relaxed);
        self.ticks_since_report.fetch_add(1, Ordering::Relaxed);
        self.tick_latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);

        self.tick_latency_sum_total_us.fetch_add(latency_us, Ordering::Relaxed);

        let bucket = bucket_index(latency_us);
        self.tick_latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.tick_latency_buckets_total[bucket].fetch_add(1, Ordering::Relaxed);

        update_atomic_max(&self.tick_latency_max_us, latency_us);
        update_atomic_max(&self.tick_latency_max_total_us, latency_us);
    }

    #[inline]
    pub fn ticks_total(&self) -> u64 {
        self.ticks_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_pass(&self) {
        self.passes_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn passes_total(&self) -> u64 {
        self.passes_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_speeder(&self) {
        self.speeders_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn speeders_total(&self) -> u64 {
        self.speeders_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_anomaly(&self) {
        self.anomalies_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn anomalies_total(&self) -> u64 {
        self.anomalies_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_reversal(&self) {
        self.reversals_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn reversals_total(&self) -> u64 {
        self.reversals_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_blockage_warning(&self) {
        self.blockage_warnings_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn blockage_warnings_total(&self) -> u64 {
        self.blockage_warnings_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_hallway_warning(&self) {
        self.hallway_warnings_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn hallway_warnings_total(&self) -> u64 {
        self.hallway_warnings_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_stats_flush(&self) {
        self.stats_flushes_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sample_dropped(&self) {
        self.samples_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sensor_error(&self) {
        self.sensor_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn sensor_errors_total(&self) -> u64 {
        self.sensor_errors_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_indicator_error(&self) {
        self.indicator_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn indicator_errors_total(&self) -> u64 {
        self.indicator_errors_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_liveness_error(&self) {
        self.liveness_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn liveness_errors_total(&self) -> u64 {
        self.liveness_errors_total.load(Ordering::Relaxed)
    }

    /// Record a sink record dropped due to channel full (lock-free)
    #[inline]
    pub fn record_sink_dropped(&self) {
        self.sink_records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn sink_records_dropped(&self) -> u64 {
        self.sink_records_dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_write_error(&self) {
        self.sink_write_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn sink_write_errors(&self) -> u64 {
        self.sink_write_errors.load(Ordering::Relaxed)
    }

    /// Set corridor occupancy (see OCCUPANCY_*)
    #[inline]
    pub fn set_occupancy(&self, occupancy: u64) {
        self.occupancy.store(occupancy, Ordering::Relaxed);
    }

    #[inline]
    pub fn occupancy(&self) -> u64 {
        self.occupancy.load(Ordering::Relaxed)
    }

    /// Calculate and return metrics summary, then reset periodic counters
    ///
    /// This is the only method that resets counters. It uses atomic swap
    /// to get a consistent snapshot while allowing concurrent updates.
    pub fn report(&self) -> MetricsSummary {
        let ticks_count = self.ticks_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.tick_latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.tick_latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.tick_latency_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        self.summarize(ticks_count, latency_sum, max_latency, lat_buckets, elapsed)
    }

    /// All-time view for scrapers. Leaves the periodic counters alone.
    pub fn snapshot(&self) -> MetricsSummary {
        self.summarize(
            self.ticks_total.load(Ordering::Relaxed),
            self.tick_latency_sum_total_us.load(Ordering::Relaxed),
            self.tick_latency_max_total_us.load(Ordering::Relaxed),
            load_buckets(&self.tick_latency_buckets_total),
            self.started_at.elapsed(),
        )
    }

    fn summarize(
        &self,
        ticks_count: u64,
        latency_sum: u64,
        max_latency: u64,
        lat_buckets: [u64; NUM_BUCKETS],
        elapsed: Duration,
    ) -> MetricsSummary {
        let ticks_per_sec = if elapsed.as_secs_f64() > 0.0 {
            ticks_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let avg_latency = if ticks_count > 0 { latency_sum / ticks_count } else { 0 };

        MetricsSummary {
            ticks_total: self.ticks_total.load(Ordering::Relaxed),
            ticks_per_sec,
            avg_tick_latency_us: avg_latency,
            max_tick_latency_us: max_latency,
            lat_sum_us: latency_sum,
            lat_buckets,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p95_us: percentile_from_buckets(&lat_buckets, 0.95),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            passes_total: self.passes_total.load(Ordering::Relaxed),
            speeders_total: self.speeders_total.load(Ordering::Relaxed),
            anomalies_total: self.anomalies_total.load(Ordering::Relaxed),
            reversals_total: self.reversals_total.load(Ordering::Relaxed),
            blockage_warnings_total: self.blockage_warnings_total.load(Ordering::Relaxed),
            hallway_warnings_total: self.hallway_warnings_total.load(Ordering::Relaxed),
            stats_flushes_total: self.stats_flushes_total.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            sensor_errors_total: self.sensor_errors_total.load(Ordering::Relaxed),
            indicator_errors_total: self.indicator_errors_total.load(Ordering::Relaxed),
            liveness_errors_total: self.liveness_errors_total.load(Ordering::Relaxed),
            sink_records_dropped: self.sink_records_dropped.load(Ordering::Relaxed),
            sink_write_errors: self.sink_write_errors.load(Ordering::Relaxed),
            occupancy: self.occupancy.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of histogram buckets (exported for the Prometheus endpoint)
pub const METRICS_NUM_BUCKETS: usize = NUM_BUCKETS;

/// Exported bucket bounds for Prometheus formatting
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = BUCKET_BOUNDS;

#[derive(Debug)]
pub struct MetricsSummary {
    pub ticks_total: u64,
    pub ticks_per_sec: f64,
    pub avg_tick_latency_us: u64,
    pub max_tick_latency_us: u64,
    /// Sum of the latencies counted in `lat_buckets`
    pub lat_sum_us: u64,
    /// Tick latency histogram buckets
    /// Bounds: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200 µs
    pub lat_buckets: [u64; NUM_BUCKETS],
    pub lat_p50_us: u64,
    pub lat_p95_us: u64,
    pub lat_p99_us: u64,
    pub passes_total: u64,
    pub speeders_total: u64,
    pub anomalies_total: u64,
    pub reversals_total: u64,
    pub blockage_warnings_total: u64,
    pub hallway_warnings_total: u64,
    pub stats_flushes_total: u64,
    pub samples_dropped: u64,
    pub sensor_errors_total: u64,
    pub indicator_errors_total: u64,
    pub liveness_errors_total: u64,
    pub sink_records_dropped: u64,
    pub sink_write_errors: u64,
    pub occupancy: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            ticks_total = %self.ticks_total,
            ticks_per_sec = format!("{:.1}", self.ticks_per_sec),
            avg_latency_us = %self.avg_tick_latency_us,
            max_latency_us = %self.max_tick_latency_us,
            p50_us = %self.lat_p50_us,
            p99_us = %self.lat_p99_us,
            passes = %self.passes_total,
            speeders = %self.speeders_total,
            anomalies = %self.anomalies_total,
            reversals = %self.reversals_total,
            sensor_errors = %self.sensor_errors_total,
            sink_dropped = %self.sink_records_dropped,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.ticks_total(), 0);
        assert_eq!(metrics.passes_total(), 0);
        assert_eq!(metrics.occupancy(), OCCUPANCY_IDLE);
    }

    #[test]
    fn test_record_tick() {
        let metrics = Metrics::new();

        metrics.record_tick(100);
        assert_eq!(metrics.ticks_total(), 1);
        assert_eq!(metrics.tick_latency_sum_us.load(Ordering::Relaxed), 100);

        metrics.record_tick(200);
        assert_eq!(metrics.ticks_total(), 2);
        assert_eq!(metrics.tick_latency_sum_us.load(Ordering::Relaxed), 300);
    }

    #[test]
    fn test_report() {
        let metrics = Metrics::new();

        metrics.record_tick(100);
        metrics.record_tick(200);
        metrics.record_tick(300);
        metrics.record_pass();
        metrics.record_speeder();

        let summary = metrics.report();

        assert_eq!(summary.ticks_total, 3);
        assert_eq!(summary.avg_tick_latency_us, 200);
        assert_eq!(summary.max_tick_latency_us, 300);
        assert_eq!(summary.passes_total, 1);
        assert_eq!(summary.speeders_total, 1);

        // Periodic counters reset, monotonic ones kept
        assert_eq!(metrics.ticks_since_report.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.tick_latency_sum_us.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.tick_latency_max_us.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.ticks_total(), 3);
    }

    #[test]
    fn test_report_empty() {
        let metrics = Metrics::new();
        let summary = metrics.report();

        assert_eq!(summary.ticks_total, 0);
        assert_eq!(summary.avg_tick_latency_us, 0);
        assert_eq!(summary.lat_p99_us, 0);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(Metrics::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for i in 0..1000 {
                    m.record_tick(i as u64);
                    m.record_sink_dropped();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.ticks_total(), 10_000);
        assert_eq!(metrics.sink_records_dropped(), 10_000);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(100), 0);
        assert_eq!(bucket_index(101), 1);
        assert_eq!(bucket_index(51200), 9);
        assert_eq!(bucket_index(51201), 10);
    }

    #[test]
    fn test_percentile_computation() {
        let metrics = Metrics::new();

        for _ in 0..100 {
            metrics.record_tick(150);
        }

        let summary = metrics.report();
        assert_eq!(summary.lat_p50_us, 200);
        assert_eq!(summary.lat_p99_us, 200);
        assert_eq!(summary.lat_buckets[1], 100);
    }

    #[test]
    fn test_snapshot_does_not_reset() {
        let metrics = Metrics::new();
        metrics.record_tick(100);
        metrics.record_tick(300);

        let snap = metrics.snapshot();
        assert_eq!(snap.ticks_total, 2);
        assert_eq!(snap.lat_sum_us, 400);
        assert_eq!(snap.max_tick_latency_us, 300);
        assert_eq!(snap.lat_buckets.iter().sum::<u64>(), 2);

        assert_eq!(metrics.ticks_since_report.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.tick_latency_sum_us.load(Ordering::Relaxed), 400);

        // A report resets the periodic view only
        metrics.report();
        metrics.record_tick(200);
        let snap = metrics.snapshot();
        assert_eq!(snap.lat_sum_us, 600);
        assert_eq!(snap.lat_buckets.iter().sum::<u64>(), 3);
        assert_eq!(metrics.report().avg_tick_latency_us, 200);
    }
}
