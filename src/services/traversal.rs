//! Traversal state machine
//!
//! Consumes one `SensorPair` per tick and evaluates exactly one transition.
//! The corridor is single occupancy: an object is tracked from the moment it
//! breaks either beam until it leaves through one of them.
//!
//! Per tick, from the current phase:
//! - Idle: a broken beam opens a session (left wins a simultaneous break)
//! - EnteringBeamBroken: entry beam restored starts the traversal
//! - Traversing: far beam breaking starts a correct exit, near beam a reversal
//! - ExitingCorrect: far beam restored completes the transit
//! - ExitingWrongWay: near beam restored closes the session uncounted
//!
//! Every phase with a broken beam also runs the repeated blockage timer;
//! Traversing runs the one-shot hallway timer.

use crate::domain::event::MonitorEvent;
use crate::domain::session::{Phase, SessionId, TraversalSession, TraversalState};
use crate::domain::types::{BeamSide, Direction, SensorPair};
use crate::services::safety::SafetyMonitor;
use smallvec::SmallVec;
use std::time::Instant;
use tracing::debug;

/// A correctly completed transit, ready for speed calculation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transit {
    pub session_id: SessionId,
    pub direction: Direction,
    /// Whole seconds from the first beam break to the far beam clearing
    pub elapsed_secs: u64,
}

/// Result of evaluating one tick
#[derive(Debug, Default)]
pub struct Step {
    /// Session the events belong to, if one was open during the tick
    pub session_id: Option<SessionId>,
    pub events: SmallVec<[MonitorEvent; 4]>,
    pub transit: Option<Transit>,
}

impl Step {
    fn emit(&mut self, event: MonitorEvent) {
        self.events.push(event);
    }
}

pub struct TraversalStateMachine {
    session: Option<TraversalSession>,
    safety: SafetyMonitor,
}

impl TraversalStateMachine {
    pub fn new(safety: SafetyMonitor) -> Self {
        Self { session: None, safety }
    }

    /// Current observable state
    pub fn state(&self) -> TraversalState {
        self.session.as_ref().map_or(TraversalState::Idle, TraversalSession::state)
    }

    /// Open session, if any
    pub fn session(&self) -> Option<&TraversalSession> {
        self.session.as_ref()
    }

    /// Evaluate one tick against freshly sampled beams
    pub fn step(&mut self, pair: SensorPair, now: Instant) -> Step {
        let mut step = Step::default();

        let Some(mut session) = self.session.take() else {
            self.session = self.open_if_broken(pair, now, &mut step);
            return step;
        };

        step.session_id = Some(session.id);
        let keep = self.advance(&mut session, pair, now, &mut step);
        if keep {
            self.session = Some(session);
        } else {
            debug!(session = %session.id, "session_closed");
        }

        step
    }

    fn open_if_broken(
        &self,
        pair: SensorPair,
        now: Instant,
        step: &mut Step,
    ) -> Option<TraversalSession> {
        // Left is checked first: a simultaneous break enters from the left
        let side = if pair.left.is_blocked() {
            BeamSide::Left
        } else if pair.right.is_blocked() {
            BeamSide::Right
        } else {
            return None;
        };

        let session = TraversalSession::open(side, now);
        step.session_id = Some(session.id);
        step.emit(MonitorEvent::SessionOpened { side });
        Some(session)
    }

    /// Returns false when the session closes
    fn advance(
        &self,
        session: &mut TraversalSession,
        pair: SensorPair,
        now: Instant,
        step: &mut Step,
    ) -> bool {
        match session.phase {
            Phase::EnteringBeamBroken(side) => {
                if !pair.is_blocked(side) {
                    let direction = Direction::entering_from(side);
                    session.enter(Phase::Traversing(direction), now);
                    step.emit(MonitorEvent::TraversalStarted { direction });
                } else {
                    self.check_blockage(session, side, now, step);
                }
                true
            }
            Phase::Traversing(direction) => {
                if let Some(dwell) = self.safety.hallway_due(&mut session.timers, now) {
                    step.emit(MonitorEvent::HallwayBlocked {
                        direction,
                        dwell_secs: dwell.as_secs(),
                    });
                }

                // Far beam first: a simultaneous break counts as a correct exit
                if pair.is_blocked(direction.far_side()) {
                    session.enter(Phase::ExitingCorrect(direction), now);
                    session.exit_broken_at = Some(now);
                    step.emit(MonitorEvent::ExitStarted { direction });
                } else if pair.is_blocked(direction.near_side()) {
                    session.enter(Phase::ExitingWrongWay(direction), now);
                    step.emit(MonitorEvent::Reversed { direction });
                }
                true
            }
            Phase::ExitingCorrect(direction) => {
                let far = direction.far_side();
                if !pair.is_blocked(far) {
                    let elapsed_secs = now.saturating_duration_since(session.entered_at).as_secs();
                    step.emit(MonitorEvent::TransitCompleted { direction, elapsed_secs });
                    step.transit = Some(Transit { session_id: session.id, direction, elapsed_secs });
                    return false;
                }
                self.check_blockage(session, far, now, step);
                true
            }
            Phase::ExitingWrongWay(direction) => {
                let near = direction.near_side();
                if !pair.is_blocked(near) {
                    step.emit(MonitorEvent::ReversalCleared { direction });
                    return false;
                }
                self.check_blockage(session, near, now, step);
                true
            }
        }
    }

    fn check_blockage(
        &self,
        session: &mut TraversalSession,
        side: BeamSide,
        now: Instant,
        step: &mut Step,
    ) {
        if self.safety.blockage_due(&mut session.timers, now) {
            let blocked_secs = now.saturating_duration_since(session.phase_entered_at).as_secs();
            step.emit(MonitorEvent::BeamBlocked { side, blocked_secs });
        }
    }
}
