//! Periodic traffic statistics report

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;

/// Speed figures for a window. An empty window has no figures at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedSummary {
    NoTraffic,
    Measured { max_mps: f64, min_mps: f64, mean_mps: f64 },
}

impl SpeedSummary {
    /// Summarize a set of measured speeds
    pub fn from_samples(samples: &[f64]) -> Self {
        let Some((&first, rest)) = samples.split_first() else {
            return SpeedSummary::NoTraffic;
        };

        let (mut max, mut min, mut sum) = (first, first, first);
        for &v in rest {
            max = max.max(v);
            min = min.min(v);
            sum += v;
        }

        SpeedSummary::Measured { max_mps: max, min_mps: min, mean_mps: sum / samples.len() as f64 }
    }
}

/// Closed statistics window, owned by whoever receives it
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub pass_count: u64,
    pub speeder_count: u64,
    /// Passes whose speed was unmeasurable
    pub anomaly_count: u64,
    /// Measured samples not retained because the window was full
    pub samples_dropped: u64,
    pub speeds: SpeedSummary,
}

impl StatsReport {
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self.speeds, SpeedSummary::NoTraffic)
    }

    /// One JSON object per report, as written to the stats file
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = json!({
            "window_start": self.window_start.to_rfc3339_opts(SecondsFormat::Secs, true),
            "window_end": self.window_end.to_rfc3339_opts(SecondsFormat::Secs, true),
            "pass_count": self.pass_count,
            "speeder_count": self.speeder_count,
            "anomaly_count": self.anomaly_count,
        });

        if self.samples_dropped > 0 {
            obj["samples_dropped"] = json!(self.samples_dropped);
        }

        match self.speeds {
            SpeedSummary::NoTraffic => {
                obj["no_traffic"] = json!(true);
            }
            SpeedSummary::Measured { max_mps, min_mps, mean_mps } => {
                obj["max_speed_mps"] = json!(max_mps);
                obj["min_speed_mps"] = json!(min_mps);
                obj["mean_speed_mps"] = json!(mean_mps);
            }
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_samples() {
        let summary = SpeedSummary::from_samples(&[2.0, 4.0, 6.0]);
        assert_eq!(summary, SpeedSummary::Measured { max_mps: 6.0, min_mps: 2.0, mean_mps: 4.0 });
    }

    #[test]
    fn test_summary_of_single_sample() {
        let summary = SpeedSummary::from_samples(&[0.75]);
        assert_eq!(summary, SpeedSummary::Measured { max_mps: 0.75, min_mps: 0.75, mean_mps: 0.75 });
    }

    #[test]
    fn test_summary_of_nothing() {
        assert_eq!(SpeedSummary::from_samples(&[]), SpeedSummary::NoTraffic);
    }

    #[test]
    fn test_no_traffic_json() {
        let start = DateTime::from_timestamp(1_767_617_600, 0).unwrap();
        let report = StatsReport {
            window_start: start,
            window_end: start + chrono::Duration::seconds(61),
            pass_count: 0,
            speeder_count: 0,
            anomaly_count: 0,
            samples_dropped: 0,
            speeds: SpeedSummary::NoTraffic,
        };

        let json = report.to_json();
        assert_eq!(json["no_traffic"], true);
        assert!(json.get("max_speed_mps").is_none());
        assert!(json.get("samples_dropped").is_none());
        assert_eq!(json["window_start"], "2026-01-05T12:53:20Z");
        assert_eq!(json["window_end"], "2026-01-05T12:54:21Z");
    }

    #[test]
    fn test_measured_json() {
        let start = DateTime::from_timestamp(1_767_617_600, 0).unwrap();
        let report = StatsReport {
            window_start: start,
            window_end: start,
            pass_count: 3,
            speeder_count: 2,
            anomaly_count: 0,
            samples_dropped: 0,
            speeds: SpeedSummary::from_samples(&[2.0, 4.0, 6.0]),
        };

        let json = report.to_json();
        assert_eq!(json["pass_count"], 3);
        assert_eq!(json["max_speed_mps"], 6.0);
        assert_eq!(json["min_speed_mps"], 2.0);
        assert_eq!(json["mean_speed_mps"], 4.0);
        assert!(json.get("no_traffic").is_none());
    }
}
