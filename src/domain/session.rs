//! Traversal session model
//!
//! The corridor holds at most one object at a time, so the state machine owns
//! an `Option<TraversalSession>`: `None` is the idle corridor, `Some` carries
//! the phase of the single object currently inside along with its timers.

use crate::domain::types::{BeamSide, Direction};
use std::time::Instant;
use uuid::Uuid;

/// Identifier attached to every log record of one traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new time-sortable (UUIDv7) session id
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observable state of the corridor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalState {
    Idle,
    EnteringBeamBroken(BeamSide),
    Traversing(Direction),
    ExitingCorrect(Direction),
    ExitingWrongWay(Direction),
}

impl TraversalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraversalState::Idle => "idle",
            TraversalState::EnteringBeamBroken(_) => "entering_beam_broken",
            TraversalState::Traversing(_) => "traversing",
            TraversalState::ExitingCorrect(_) => "exiting_correct",
            TraversalState::ExitingWrongWay(_) => "exiting_wrong_way",
        }
    }
}

/// Phase of an open session. `Idle` is not a phase: it is the absence of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Entry beam still broken by the arriving object
    EnteringBeamBroken(BeamSide),
    /// Object between the beams
    Traversing(Direction),
    /// Object breaking the far beam on its way out
    ExitingCorrect(Direction),
    /// Object turned around and is breaking the near beam again
    ExitingWrongWay(Direction),
}

impl Phase {
    /// The beam whose blockage is being timed in this phase, if any
    pub fn blocked_side(&self) -> Option<BeamSide> {
        match *self {
            Phase::EnteringBeamBroken(side) => Some(side),
            Phase::Traversing(_) => None,
            Phase::ExitingCorrect(direction) => Some(direction.far_side()),
            Phase::ExitingWrongWay(direction) => Some(direction.near_side()),
        }
    }
}

impl From<Phase> for TraversalState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::EnteringBeamBroken(side) => TraversalState::EnteringBeamBroken(side),
            Phase::Traversing(d) => TraversalState::Traversing(d),
            Phase::ExitingCorrect(d) => TraversalState::ExitingCorrect(d),
            Phase::ExitingWrongWay(d) => TraversalState::ExitingWrongWay(d),
        }
    }
}

/// Safety timers of one session.
///
/// Both start unarmed; the state machine arms the one that applies to the
/// phase it just entered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafetyTimers {
    /// Reference point of the repeated "beam blocked" warning: phase entry,
    /// then the last time the warning fired
    pub blockage_armed_at: Option<Instant>,
    /// When the object entered `Traversing`
    pub dwell_started_at: Option<Instant>,
    /// Set once the "hallway blocked" warning has fired for this session
    pub hallway_latched: bool,
}

impl SafetyTimers {
    /// Start timing a beam blockage; disarms the dwell timer
    pub fn arm_blockage(&mut self, now: Instant) {
        self.blockage_armed_at = Some(now);
        self.dwell_started_at = None;
    }

    /// Start timing the stay between the beams; disarms the blockage timer
    pub fn arm_dwell(&mut self, now: Instant) {
        self.dwell_started_at = Some(now);
        self.blockage_armed_at = None;
    }
}

/// The single object currently transiting the corridor
#[derive(Debug, Clone)]
pub struct TraversalSession {
    pub id: SessionId,
    pub phase: Phase,
    /// When the entry beam first broke
    pub entered_at: Instant,
    /// When the current phase began
    pub phase_entered_at: Instant,
    /// When the far beam broke, once the object is leaving correctly
    pub exit_broken_at: Option<Instant>,
    pub timers: SafetyTimers,
}

impl TraversalSession {
    /// Open a session for an object breaking the beam on `side`
    pub fn open(side: BeamSide, now: Instant) -> Self {
        let mut timers = SafetyTimers::default();
        timers.arm_blockage(now);
        Self {
            id: SessionId::new(),
            phase: Phase::EnteringBeamBroken(side),
            entered_at: now,
            phase_entered_at: now,
            exit_broken_at: None,
            timers,
        }
    }

    /// Move to `phase`, restarting the phase clock
    pub fn enter(&mut self, phase: Phase, now: Instant) {
        self.phase = phase;
        self.phase_entered_at = now;
        match phase {
            Phase::Traversing(_) => self.timers.arm_dwell(now),
            _ => self.timers.arm_blockage(now),
        }
    }

    #[inline]
    pub fn state(&self) -> TraversalState {
        self.phase.into()
    }
}
