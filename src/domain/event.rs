//! Monitor events and the structured log records derived from them
//!
//! The core never writes anything itself. Every notable thing it observes is
//! returned as a `MonitorEvent`; the tick loop turns each one into a tracing
//! record and a `LogRecord` for the event sink.

use crate::domain::session::SessionId;
use crate::domain::types::{BeamSide, Direction, SensorPair};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    // Startup
    MonitorStarted,
    SpeedLimitZero,
    BeamsNotClear { attempt: u32, pair: SensorPair },
    BeamsConnected { attempts: u32 },
    ConnectivityExhausted { attempts: u32 },
    StartupFailed { reason: String },

    // Traversal state machine
    SessionOpened { side: BeamSide },
    TraversalStarted { direction: Direction },
    ExitStarted { direction: Direction },
    Reversed { direction: Direction },
    ReversalCleared { direction: Direction },
    TransitCompleted { direction: Direction, elapsed_secs: u64 },

    // Safety timers
    BeamBlocked { side: BeamSide, blocked_secs: u64 },
    HallwayBlocked { direction: Direction, dwell_secs: u64 },

    // Speed verdicts
    Passed { direction: Direction, speed_mps: f64 },
    Speeding { direction: Direction, speed_mps: f64, excess_mps: f64 },
    Anomalous { direction: Direction },

    // Stats
    StatsFlushed { pass_count: u64, speeder_count: u64 },
    SampleDropped { capacity: usize },

    // Port faults
    SensorFault { error: String },
    IndicatorFault { error: String },
    LivenessFault { error: String },
}

impl MonitorEvent {
    /// Snake-case event name used as the tracing message
    pub fn name(&self) -> &'static str {
        match self {
            MonitorEvent::MonitorStarted => "monitor_started",
            MonitorEvent::SpeedLimitZero => "speed_limit_zero",
            MonitorEvent::BeamsNotClear { .. } => "beams_not_clear",
            MonitorEvent::BeamsConnected { .. } => "beams_connected",
            MonitorEvent::ConnectivityExhausted { .. } => "connectivity_exhausted",
            MonitorEvent::StartupFailed { .. } => "startup_failed",
            MonitorEvent::SessionOpened { .. } => "session_opened",
            MonitorEvent::TraversalStarted { .. } => "traversal_started",
            MonitorEvent::ExitStarted { .. } => "exit_started",
            MonitorEvent::Reversed { .. } => "reversed_in_corridor",
            MonitorEvent::ReversalCleared { .. } => "reversal_cleared",
            MonitorEvent::TransitCompleted { .. } => "transit_completed",
            MonitorEvent::BeamBlocked { .. } => "beam_blocked",
            MonitorEvent::HallwayBlocked { .. } => "hallway_blocked",
            MonitorEvent::Passed { .. } => "passed",
            MonitorEvent::Speeding { .. } => "speeding",
            MonitorEvent::Anomalous { .. } => "anomalous_transit",
            MonitorEvent::StatsFlushed { .. } => "stats_flushed",
            MonitorEvent::SampleDropped { .. } => "sample_dropped",
            MonitorEvent::SensorFault { .. } => "sensor_fault",
            MonitorEvent::IndicatorFault { .. } => "indicator_fault",
            MonitorEvent::LivenessFault { .. } => "liveness_fault",
        }
    }

    /// Subsystem that produced the event
    pub fn component(&self) -> &'static str {
        match self {
            MonitorEvent::MonitorStarted
            | MonitorEvent::SpeedLimitZero
            | MonitorEvent::StartupFailed { .. } => "monitor",
            MonitorEvent::BeamsNotClear { .. }
            | MonitorEvent::BeamsConnected { .. }
            | MonitorEvent::ConnectivityExhausted { .. } => "connectivity",
            MonitorEvent::SessionOpened { .. }
            | MonitorEvent::TraversalStarted { .. }
            | MonitorEvent::ExitStarted { .. }
            | MonitorEvent::Reversed { .. }
            | MonitorEvent::ReversalCleared { .. }
            | MonitorEvent::TransitCompleted { .. } => "traversal",
            MonitorEvent::BeamBlocked { .. } | MonitorEvent::HallwayBlocked { .. } => "safety",
            MonitorEvent::Passed { .. }
            | MonitorEvent::Speeding { .. }
            | MonitorEvent::Anomalous { .. } => "speed",
            MonitorEvent::StatsFlushed { .. } | MonitorEvent::SampleDropped { .. } => "stats",
            MonitorEvent::SensorFault { .. } => "sensors",
            MonitorEvent::IndicatorFault { .. } => "indicators",
            MonitorEvent::LivenessFault { .. } => "liveness",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            MonitorEvent::SessionOpened { .. }
            | MonitorEvent::TraversalStarted { .. }
            | MonitorEvent::ExitStarted { .. }
            | MonitorEvent::ReversalCleared { .. }
            | MonitorEvent::TransitCompleted { .. } => Severity::Debug,
            MonitorEvent::MonitorStarted
            | MonitorEvent::BeamsConnected { .. }
            | MonitorEvent::Reversed { .. }
            | MonitorEvent::Passed { .. }
            | MonitorEvent::StatsFlushed { .. } => Severity::Info,
            MonitorEvent::SpeedLimitZero
            | MonitorEvent::BeamBlocked { .. }
            | MonitorEvent::HallwayBlocked { .. }
            | MonitorEvent::Speeding { .. }
            | MonitorEvent::Anomalous { .. }
            | MonitorEvent::SampleDropped { .. } => Severity::Warning,
            MonitorEvent::BeamsNotClear { .. }
            | MonitorEvent::SensorFault { .. }
            | MonitorEvent::IndicatorFault { .. } => Severity::Error,
            MonitorEvent::ConnectivityExhausted { .. }
            | MonitorEvent::StartupFailed { .. }
            | MonitorEvent::LivenessFault { .. } => Severity::Critical,
        }
    }

    /// Human readable message for the log file
    pub fn message(&self) -> String {
        match self {
            MonitorEvent::MonitorStarted => "hallway monitor running".to_string(),
            MonitorEvent::SpeedLimitZero => {
                "speed limit is 0; flagging every object moving through the hall".to_string()
            }
            MonitorEvent::BeamsNotClear { attempt, pair } => format!(
                "beam not reaching photodiode on attempt {attempt} (left={}, right={})",
                pair.left.as_str(),
                pair.right.as_str()
            ),
            MonitorEvent::BeamsConnected { attempts } => {
                format!("connection with both beams established after {attempts} attempt(s)")
            }
            MonitorEvent::ConnectivityExhausted { attempts } => {
                format!("beams still not clear after {attempts} attempts; giving up")
            }
            MonitorEvent::StartupFailed { reason } => format!("startup failed: {reason}"),
            MonitorEvent::SessionOpened { side } => format!("{side} beam broken, object entering"),
            MonitorEvent::TraversalStarted { direction } => {
                format!("object inside the hall moving {direction}")
            }
            MonitorEvent::ExitStarted { direction } => {
                format!("object leaving the hall moving {direction}")
            }
            MonitorEvent::Reversed { direction } => {
                format!("object moving {direction} turned around and walked back out")
            }
            MonitorEvent::ReversalCleared { .. } => "reversed object has left the hall".to_string(),
            MonitorEvent::TransitCompleted { direction, elapsed_secs } => {
                format!("transit {direction} completed in {elapsed_secs}s")
            }
            MonitorEvent::BeamBlocked { side, blocked_secs } => {
                format!("someone is blocking the {side} beam ({blocked_secs}s)")
            }
            MonitorEvent::HallwayBlocked { dwell_secs, .. } => {
                format!("someone is blocking the hallway ({dwell_secs}s)")
            }
            MonitorEvent::Passed { speed_mps, .. } => {
                format!("object passed through the hall at {speed_mps:.2} m/s")
            }
            MonitorEvent::Speeding { speed_mps, excess_mps, .. } => format!(
                "object sped through the hall at {speed_mps:.2} m/s ({excess_mps:.2} m/s over the limit)"
            ),
            MonitorEvent::Anomalous { .. } => {
                "an anomalously fast object went through the hall".to_string()
            }
            MonitorEvent::StatsFlushed { pass_count, speeder_count } => {
                format!("stats window closed: {pass_count} passes, {speeder_count} speeders")
            }
            MonitorEvent::SampleDropped { capacity } => {
                format!("stats window holds {capacity} samples; sample not retained")
            }
            MonitorEvent::SensorFault { error } => format!("sensor read failed: {error}"),
            MonitorEvent::IndicatorFault { error } => format!("indicator write failed: {error}"),
            MonitorEvent::LivenessFault { error } => {
                format!("watchdog acknowledgment failed: {error}")
            }
        }
    }

    /// Optional numeric payload
    pub fn value(&self) -> Option<f64> {
        match *self {
            MonitorEvent::BeamsNotClear { attempt, .. } => Some(f64::from(attempt)),
            MonitorEvent::BeamsConnected { attempts }
            | MonitorEvent::ConnectivityExhausted { attempts } => Some(f64::from(attempts)),
            MonitorEvent::TransitCompleted { elapsed_secs, .. } => Some(elapsed_secs as f64),
            MonitorEvent::BeamBlocked { blocked_secs, .. } => Some(blocked_secs as f64),
            MonitorEvent::HallwayBlocked { dwell_secs, .. } => Some(dwell_secs as f64),
            MonitorEvent::Passed { speed_mps, .. } | MonitorEvent::Speeding { speed_mps, .. } => {
                Some(speed_mps)
            }
            _ => None,
        }
    }

    /// Desired warning indicator level after this event, if it changes it.
    ///
    /// The indicator is lit while an object is between the beams.
    pub fn warning_indicator(&self) -> Option<bool> {
        match self {
            MonitorEvent::TraversalStarted { .. } => Some(true),
            MonitorEvent::ExitStarted { .. } | MonitorEvent::Reversed { .. } => Some(false),
            _ => None,
        }
    }

    /// Whether the event should be acknowledged with the warning blink pattern
    pub fn wants_blink(&self) -> bool {
        matches!(self, MonitorEvent::Speeding { .. } | MonitorEvent::Anomalous { .. })
    }
}

/// One line of the event log
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub component: &'static str,
    pub severity: Severity,
    pub event: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

impl LogRecord {
    pub fn new(at: DateTime<Utc>, event: &MonitorEvent, session: Option<SessionId>) -> Self {
        Self {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            component: event.component(),
            severity: event.severity(),
            event: event.name(),
            message: event.message(),
            value: event.value(),
            session: session.map(|s| s.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_classification() {
        let blocked = MonitorEvent::BeamBlocked { side: BeamSide::Left, blocked_secs: 5 };
        assert_eq!(blocked.severity(), Severity::Warning);
        assert_eq!(blocked.component(), "safety");
        assert_eq!(blocked.value(), Some(5.0));

        let reversed = MonitorEvent::Reversed { direction: Direction::LeftToRight };
        assert_eq!(reversed.severity(), Severity::Info);
        assert_eq!(reversed.warning_indicator(), Some(false));

        let fault = MonitorEvent::LivenessFault { error: "EBADF".to_string() };
        assert_eq!(fault.severity(), Severity::Critical);
    }

    #[test]
    fn test_blink_only_for_speed_warnings() {
        let d = Direction::RightToLeft;
        assert!(MonitorEvent::Speeding { direction: d, speed_mps: 2.0, excess_mps: 1.0 }
            .wants_blink());
        assert!(MonitorEvent::Anomalous { direction: d }.wants_blink());
        assert!(!MonitorEvent::Passed { direction: d, speed_mps: 0.5 }.wants_blink());
        assert!(!MonitorEvent::HallwayBlocked { direction: d, dwell_secs: 10 }.wants_blink());
    }

    #[test]
    fn test_log_record_serialization() {
        let at = DateTime::from_timestamp(1_767_617_600, 0).unwrap();
        let event = MonitorEvent::Passed { direction: Direction::LeftToRight, speed_mps: 0.75 };
        let record = LogRecord::new(at, &event, None);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["component"], "speed");
        assert_eq!(json["severity"], "info");
        assert_eq!(json["event"], "passed");
        assert_eq!(json["value"], 0.75);
        assert_eq!(json["timestamp"], "2026-01-05T12:53:20.000Z");
        assert!(json.get("session").is_none());
    }
}
