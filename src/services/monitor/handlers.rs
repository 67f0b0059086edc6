//! Step handlers for the Monitor
//!
//! Each handler turns what the core produced into side effects: indicator
//! writes, metrics, tracing output and sink records.

use super::Monitor;
use crate::domain::event::{LogRecord, MonitorEvent, Severity};
use crate::domain::session::{SessionId, TraversalState};
use crate::infra::metrics::{
    OCCUPANCY_ENTERING, OCCUPANCY_EXITING, OCCUPANCY_IDLE, OCCUPANCY_TRAVERSING,
};
use crate::io::ports::{IndicatorPort, LivenessPort, SensorPort};
use crate::services::sink_worker::SinkSender;
use crate::services::stats::Verdict;
use crate::services::traversal::{Step, Transit};
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Log an event through tracing and hand it to the sink
pub fn publish(
    sink: &SinkSender,
    at: DateTime<Utc>,
    event: &MonitorEvent,
    session: Option<SessionId>,
) {
    let component = event.component();
    let message = event.message();
    let session_str = session.map(|s| s.to_string()).unwrap_or_default();

    match event.severity() {
        Severity::Debug => {
            debug!(component, session = %session_str, detail = %message, "{}", event.name())
        }
        Severity::Info => {
            info!(component, session = %session_str, detail = %message, "{}", event.name())
        }
        Severity::Warning => {
            warn!(component, session = %session_str, detail = %message, "{}", event.name())
        }
        Severity::Error => {
            error!(component, session = %session_str, detail = %message, "{}", event.name())
        }
        Severity::Critical => error!(
            component,
            critical = true,
            session = %session_str,
            detail = %message,
            "{}",
            event.name()
        ),
    }

    sink.send_log(LogRecord::new(at, event, session));
}

pub(crate) fn occupancy(state: TraversalState) -> u64 {
    match state {
        TraversalState::Idle => OCCUPANCY_IDLE,
        TraversalState::EnteringBeamBroken(_) => OCCUPANCY_ENTERING,
        TraversalState::Traversing(_) => OCCUPANCY_TRAVERSING,
        TraversalState::ExitingCorrect(_) | TraversalState::ExitingWrongWay(_) => {
            OCCUPANCY_EXITING
        }
    }
}

impl<S, I, L> Monitor<S, I, L>
where
    S: SensorPort,
    I: IndicatorPort,
    L: LivenessPort,
{
    pub(crate) fn emit(
        &self,
        wall: DateTime<Utc>,
        event: &MonitorEvent,
        session: Option<SessionId>,
    ) {
        publish(&self.sink, wall, event, session);
    }

    /// Close the stats window if due, then ship every report still waiting
    pub(crate) fn flush_stats_if_due(&mut self, now: Instant, wall: DateTime<Utc>) {
        if let Some(report) = self.stats.flush_if_due(now, wall) {
            self.metrics.record_stats_flush();
            let event = MonitorEvent::StatsFlushed {
                pass_count: report.pass_count,
                speeder_count: report.speeder_count,
            };
            self.emit(wall, &event, None);
            self.pending_stats.push_back(report);
        }

        self.ship_pending_stats();
    }

    /// Reports stay queued here until the sink accepts them
    fn ship_pending_stats(&mut self) {
        while let Some(report) = self.pending_stats.pop_front() {
            if let Err(report) = self.sink.send_stats(report) {
                self.pending_stats.push_front(report);
                break;
            }
        }

        if self.pending_stats.len() > self.pending_stats_warned {
            warn!(pending = %self.pending_stats.len(), "stats_report_deferred");
        }
        self.pending_stats_warned = self.pending_stats.len();
    }

    /// Apply everything one state machine step produced
    pub(crate) fn handle_step(&mut self, step: Step, now: Instant, wall: DateTime<Utc>) {
        let Step { session_id, events, transit } = step;

        for event in &events {
            match event {
                // Someone new is inside: the latch takes over from any blink
                MonitorEvent::TraversalStarted { .. } => self.blink.cancel(),
                MonitorEvent::Reversed { .. } => self.metrics.record_reversal(),
                MonitorEvent::BeamBlocked { .. } => self.metrics.record_blockage_warning(),
                MonitorEvent::HallwayBlocked { .. } => self.metrics.record_hallway_warning(),
                _ => {}
            }

            if let Some(level) = event.warning_indicator() {
                self.write_warning(level, wall);
            }

            self.emit(wall, event, session_id);
        }

        if let Some(transit) = transit {
            self.handle_transit(transit, now, wall);
        }
    }

    /// Speed verdict and statistics for a completed transit
    pub(crate) fn handle_transit(&mut self, transit: Transit, now: Instant, wall: DateTime<Utc>) {
        let Transit { session_id, direction, elapsed_secs } = transit;
        let sample = self.speed.speed(elapsed_secs);
        let recorded = self.stats.record(sample);
        self.metrics.record_pass();

        let event = match (recorded.verdict, sample.mps()) {
            (Verdict::Anomalous, _) | (_, None) => {
                self.metrics.record_anomaly();
                MonitorEvent::Anomalous { direction }
            }
            (Verdict::Speeding { excess_mps }, Some(speed_mps)) => {
                self.metrics.record_speeder();
                MonitorEvent::Speeding { direction, speed_mps, excess_mps }
            }
            (Verdict::WithinLimit, Some(speed_mps)) => MonitorEvent::Passed { direction, speed_mps },
        };

        if event.wants_blink() {
            self.blink.start(now);
        }
        self.emit(wall, &event, Some(session_id));

        if !recorded.sample_retained {
            self.metrics.record_sample_dropped();
            let dropped = MonitorEvent::SampleDropped { capacity: self.stats_capacity() };
            self.emit(wall, &dropped, Some(session_id));
        }
    }

    pub(crate) fn write_warning(&mut self, on: bool, wall: DateTime<Utc>) {
        if let Err(e) = self.indicators.set_warning(on) {
            self.metrics.record_indicator_error();
            self.emit(wall, &MonitorEvent::IndicatorFault { error: format!("{e:#}") }, None);
        }
    }

    pub(crate) fn sensor_failed(&mut self, e: &anyhow::Error, wall: DateTime<Utc>) {
        self.metrics.record_sensor_error();
        self.sensor_fault_streak += 1;
        if self.sensor_fault_streak == 1 {
            self.emit(wall, &MonitorEvent::SensorFault { error: format!("{e:#}") }, None);
        }
    }

    pub(crate) fn sensor_recovered(&mut self) {
        if self.sensor_fault_streak > 0 {
            info!(failed_reads = %self.sensor_fault_streak, "sensor_recovered");
            self.sensor_fault_streak = 0;
        }
    }

    /// Pet the watchdog. Runs on every tick, including after a failed read.
    pub(crate) fn acknowledge_liveness(&mut self, wall: DateTime<Utc>) {
        match self.liveness.acknowledge() {
            Ok(()) => {
                if self.liveness_fault_streak > 0 {
                    info!(failed_acks = %self.liveness_fault_streak, "liveness_recovered");
                    self.liveness_fault_streak = 0;
                }
            }
            Err(e) => {
                self.metrics.record_liveness_error();
                self.liveness_fault_streak += 1;
                if self.liveness_fault_streak == 1 {
                    self.emit(wall, &MonitorEvent::LivenessFault { error: format!("{e:#}") }, None);
                }
            }
        }
    }

    fn stats_capacity(&self) -> usize {
        self.stats.max_samples()
    }
}
