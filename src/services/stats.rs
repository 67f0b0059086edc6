//! Rolling traffic statistics
//!
//! Completed transits are recorded into the open window. When the window
//! has been open for strictly longer than the reporting period it is closed
//! and replaced in one step, so every sample lands in exactly one report.

use crate::domain::speed::SpeedSample;
use crate::domain::stats::{SpeedSummary, StatsReport};
use chrono::{DateTime, Utc};
use std::mem;
use std::time::{Duration, Instant};

/// How a recorded transit compared against the limit
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    WithinLimit,
    Speeding { excess_mps: f64 },
    /// Too fast to measure; never compared against the limit
    Anomalous,
}

/// Outcome of recording one transit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recorded {
    pub verdict: Verdict,
    /// False when the window was full and the sample was counted but not kept
    pub sample_retained: bool,
}

#[derive(Debug)]
struct StatsWindow {
    started_at: Instant,
    window_start: DateTime<Utc>,
    pass_count: u64,
    speeder_count: u64,
    anomaly_count: u64,
    samples_dropped: u64,
    samples: Vec<f64>,
}

impl StatsWindow {
    fn open(now: Instant, wall: DateTime<Utc>, capacity: usize) -> Self {
        Self {
            started_at: now,
            window_start: wall,
            pass_count: 0,
            speeder_count: 0,
            anomaly_count: 0,
            samples_dropped: 0,
            samples: Vec::with_capacity(capacity.min(256)),
        }
    }

    fn close(self, window_end: DateTime<Utc>) -> StatsReport {
        StatsReport {
            window_start: self.window_start,
            window_end,
            pass_count: self.pass_count,
            speeder_count: self.speeder_count,
            anomaly_count: self.anomaly_count,
            samples_dropped: self.samples_dropped,
            speeds: SpeedSummary::from_samples(&self.samples),
        }
    }
}

pub struct StatsAggregator {
    period: Duration,
    speed_limit_mps: f64,
    max_samples: usize,
    window: StatsWindow,
}

impl StatsAggregator {
    pub fn new(
        period: Duration,
        speed_limit_mps: f64,
        max_samples: usize,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Self {
        Self {
            period,
            speed_limit_mps,
            max_samples,
            window: StatsWindow::open(now, wall, max_samples),
        }
    }

    /// Samples retained per window
    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    /// Record one correctly completed transit
    pub fn record(&mut self, sample: SpeedSample) -> Recorded {
        let window = &mut self.window;
        window.pass_count += 1;

        let SpeedSample::Measured(mps) = sample else {
            window.anomaly_count += 1;
            return Recorded { verdict: Verdict::Anomalous, sample_retained: true };
        };

        let sample_retained = if window.samples.len() < self.max_samples {
            window.samples.push(mps);
            true
        } else {
            window.samples_dropped += 1;
            false
        };

        let verdict = match sample.excess_over(self.speed_limit_mps) {
            Some(excess_mps) => {
                window.speeder_count += 1;
                Verdict::Speeding { excess_mps }
            }
            None => Verdict::WithinLimit,
        };

        Recorded { verdict, sample_retained }
    }

    /// Close the window if it has been open longer than the period
    pub fn flush_if_due(&mut self, now: Instant, wall: DateTime<Utc>) -> Option<StatsReport> {
        if now.saturating_duration_since(self.window.started_at) <= self.period {
            return None;
        }
        let closed = mem::replace(&mut self.window, StatsWindow::open(now, wall, self.max_samples));
        Some(closed.close(wall))
    }

    pub fn pass_count(&self) -> u64 {
        self.window.pass_count
    }

    pub fn speeder_count(&self) -> u64 {
        self.window.speeder_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator(t0: Instant) -> StatsAggregator {
        StatsAggregator::new(Duration::from_secs(60), 1.0, 1000, t0, Utc::now())
    }

    #[test]
    fn test_flush_summarizes_window() {
        let t0 = Instant::now();
        let mut stats = aggregator(t0);

        for v in [2.0, 4.0, 6.0] {
            stats.record(SpeedSample::Measured(v));
        }

        let report = stats.flush_if_due(t0 + Duration::from_secs(61), Utc::now()).unwrap();
        assert_eq!(report.pass_count, 3);
        assert_eq!(report.speeder_count, 3);
        assert_eq!(
            report.speeds,
            SpeedSummary::Measured { max_mps: 6.0, min_mps: 2.0, mean_mps: 4.0 }
        );
    }

    #[test]
    fn test_empty_window_reports_no_traffic() {
        let t0 = Instant::now();
        let mut stats = aggregator(t0);

        let report = stats.flush_if_due(t0 + Duration::from_secs(61), Utc::now()).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.pass_count, 0);
    }

    #[test]
    fn test_flush_only_after_period_strictly_exceeded() {
        let t0 = Instant::now();
        let mut stats = aggregator(t0);

        assert!(stats.flush_if_due(t0 + Duration::from_secs(60), Utc::now()).is_none());
        assert!(stats.flush_if_due(t0 + Duration::from_millis(60_001), Utc::now()).is_some());
        // New window starts at the flush instant
        assert!(stats.flush_if_due(t0 + Duration::from_secs(61), Utc::now()).is_none());
    }

    #[test]
    fn test_samples_not_shared_across_windows() {
        let t0 = Instant::now();
        let mut stats = aggregator(t0);

        stats.record(SpeedSample::Measured(0.5));
        let first = stats.flush_if_due(t0 + Duration::from_secs(61), Utc::now()).unwrap();
        stats.record(SpeedSample::Measured(0.8));
        let second = stats.flush_if_due(t0 + Duration::from_secs(122), Utc::now()).unwrap();

        assert_eq!(first.pass_count, 1);
        assert_eq!(second.pass_count, 1);
        assert_eq!(first.speeds, SpeedSummary::from_samples(&[0.5]));
        assert_eq!(second.speeds, SpeedSummary::from_samples(&[0.8]));
    }

    #[test]
    fn test_verdicts() {
        let mut stats = aggregator(Instant::now());

        assert_eq!(stats.record(SpeedSample::Measured(0.75)).verdict, Verdict::WithinLimit);
        assert_eq!(stats.record(SpeedSample::Measured(1.0)).verdict, Verdict::WithinLimit);
        assert_eq!(
            stats.record(SpeedSample::Measured(1.5)).verdict,
            Verdict::Speeding { excess_mps: 0.5 }
        );
        assert_eq!(stats.record(SpeedSample::Unmeasurable).verdict, Verdict::Anomalous);

        assert_eq!(stats.pass_count(), 4);
        assert_eq!(stats.speeder_count(), 1);
    }

    #[test]
    fn test_anomaly_excluded_from_summary() {
        let t0 = Instant::now();
        let mut stats = aggregator(t0);

        stats.record(SpeedSample::Unmeasurable);
        stats.record(SpeedSample::Measured(0.5));

        let report = stats.flush_if_due(t0 + Duration::from_secs(61), Utc::now()).unwrap();
        assert_eq!(report.pass_count, 2);
        assert_eq!(report.anomaly_count, 1);
        assert_eq!(report.speeder_count, 0);
        assert_eq!(report.speeds, SpeedSummary::from_samples(&[0.5]));
    }

    #[test]
    fn test_full_window_counts_but_drops_sample() {
        let t0 = Instant::now();
        let mut stats = StatsAggregator::new(Duration::from_secs(60), 1.0, 2, t0, Utc::now());

        assert!(stats.record(SpeedSample::Measured(0.2)).sample_retained);
        assert!(stats.record(SpeedSample::Measured(0.4)).sample_retained);
        let third = stats.record(SpeedSample::Measured(3.0));
        assert!(!third.sample_retained);
        assert_eq!(third.verdict, Verdict::Speeding { excess_mps: 2.0 });

        let report = stats.flush_if_due(t0 + Duration::from_secs(61), Utc::now()).unwrap();
        assert_eq!(report.pass_count, 3);
        assert_eq!(report.speeder_count, 1);
        assert_eq!(report.samples_dropped, 1);
        assert_eq!(report.speeds, SpeedSummary::from_samples(&[0.2, 0.4]));
    }

    #[test]
    fn test_zero_limit_flags_every_measured_transit() {
        let mut stats = StatsAggregator::new(Duration::from_secs(60), 0.0, 10, Instant::now(), Utc::now());
        assert!(matches!(stats.record(SpeedSample::Measured(0.1)).verdict, Verdict::Speeding { .. }));
    }
}
