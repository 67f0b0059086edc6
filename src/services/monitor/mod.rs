//! Tick loop orchestration
//!
//! The Monitor owns every piece of mutable state and drives one tick at a
//! time:
//! - Stats window flush when the period has elapsed, and hand-off of any
//!   report the sink could not take yet
//! - Sensor sampling and one state machine transition
//! - Speed verdicts and indicator updates for whatever the step produced
//! - Warning blink pattern
//! - Watchdog acknowledgment, on every tick regardless of what happened above

mod handlers;

pub use handlers::publish;

use crate::domain::session::TraversalState;
use crate::domain::stats::StatsReport;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::ports::{IndicatorPort, LivenessPort, SensorPort};
use crate::services::blink::BlinkPattern;
use crate::services::safety::SafetyMonitor;
use crate::services::sink_worker::SinkSender;
use crate::services::speed::SpeedCalculator;
use crate::services::stats::StatsAggregator;
use crate::services::traversal::TraversalStateMachine;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};

/// Single-writer owner of the corridor state
pub struct Monitor<S, I, L> {
    pub(crate) sensors: S,
    pub(crate) indicators: I,
    pub(crate) liveness: L,
    /// Traversal state machine with its safety timers
    pub(crate) fsm: TraversalStateMachine,
    pub(crate) speed: SpeedCalculator,
    /// Open statistics window
    pub(crate) stats: StatsAggregator,
    /// Closed windows the sink has not accepted yet, oldest first
    pub(crate) pending_stats: VecDeque<StatsReport>,
    /// Backlog size last warned about
    pending_stats_warned: usize,
    pub(crate) blink: BlinkPattern,
    /// Non-blocking handoff to the sink writer
    pub(crate) sink: SinkSender,
    pub(crate) metrics: Arc<Metrics>,
    /// Consecutive failed sensor reads; only the first of a run is logged
    pub(crate) sensor_fault_streak: u64,
    /// Consecutive failed watchdog acknowledgments
    pub(crate) liveness_fault_streak: u64,
    tick_period: Duration,
}

impl<S, I, L> Monitor<S, I, L>
where
    S: SensorPort,
    I: IndicatorPort,
    L: LivenessPort,
{
    pub fn new(
        config: &Config,
        sensors: S,
        indicators: I,
        liveness: L,
        sink: SinkSender,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self::starting_at(config, sensors, indicators, liveness, sink, metrics, Instant::now(), Utc::now())
    }

    /// Build a monitor whose first stats window opens at the given instant
    #[allow(clippy::too_many_arguments)]
    pub fn starting_at(
        config: &Config,
        sensors: S,
        indicators: I,
        liveness: L,
        sink: SinkSender,
        metrics: Arc<Metrics>,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Self {
        let safety = SafetyMonitor::new(config.block_timeout(), config.hallway_timeout());
        Self {
            sensors,
            indicators,
            liveness,
            fsm: TraversalStateMachine::new(safety),
            speed: SpeedCalculator::new(config.beam_distance_m()),
            stats: StatsAggregator::new(
                config.stats_period(),
                config.speed_limit_mps(),
                config.stats_max_samples(),
                now,
                wall,
            ),
            pending_stats: VecDeque::new(),
            pending_stats_warned: 0,
            blink: BlinkPattern::new(),
            sink,
            metrics,
            sensor_fault_streak: 0,
            liveness_fault_streak: 0,
            tick_period: config.tick_period(),
        }
    }

    /// Run ticks forever at the configured period
    pub async fn run(&mut self) {
        let mut ticker = interval(self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.tick(Instant::now(), Utc::now());
        }
    }

    /// Evaluate one tick
    pub fn tick(&mut self, now: Instant, wall: DateTime<Utc>) {
        let tick_start = Instant::now();

        self.flush_stats_if_due(now, wall);

        match self.sensors.read_pair() {
            Ok(pair) => {
                self.sensor_recovered();
                let step = self.fsm.step(pair, now);
                self.handle_step(step, now, wall);
                self.metrics.set_occupancy(handlers::occupancy(self.fsm.state()));
            }
            Err(e) => self.sensor_failed(&e, wall),
        }

        if let Some(level) = self.blink.poll(now) {
            self.write_warning(level, wall);
        }

        self.acknowledge_liveness(wall);

        let latency_us = tick_start.elapsed().as_micros() as u64;
        self.metrics.record_tick(latency_us);
    }

    /// Current corridor state
    pub fn state(&self) -> TraversalState {
        self.fsm.state()
    }
}
