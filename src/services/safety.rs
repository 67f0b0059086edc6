//! Safety timers: beam blockage and hallway dwell
//!
//! A beam blocked for `block_timeout` raises a warning and re-arms, so an
//! object parked in a beam produces one warning every `block_timeout`. An
//! object between the beams for `hallway_timeout` raises a single warning
//! per session.

use crate::domain::session::SafetyTimers;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct SafetyMonitor {
    block_timeout: Duration,
    hallway_timeout: Duration,
}

impl SafetyMonitor {
    pub fn new(block_timeout: Duration, hallway_timeout: Duration) -> Self {
        Self { block_timeout, hallway_timeout }
    }

    /// True when the armed blockage timer has run out. Re-arms at `now`.
    pub fn blockage_due(&self, timers: &mut SafetyTimers, now: Instant) -> bool {
        let Some(armed_at) = timers.blockage_armed_at else {
            return false;
        };
        if now.saturating_duration_since(armed_at) >= self.block_timeout {
            timers.blockage_armed_at = Some(now);
            return true;
        }
        false
    }

    /// Dwell time when the hallway warning fires, at most once per session
    pub fn hallway_due(&self, timers: &mut SafetyTimers, now: Instant) -> Option<Duration> {
        if timers.hallway_latched {
            return None;
        }
        let started_at = timers.dwell_started_at?;
        let dwell = now.saturating_duration_since(started_at);
        if dwell >= self.hallway_timeout {
            timers.hallway_latched = true;
            return Some(dwell);
        }
        None
    }
}
