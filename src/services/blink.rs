//! Warning indicator blink pattern
//!
//! Three on/off cycles of 200ms each, driven by the tick loop so the loop
//! never sleeps while blinking. The pattern always ends with the indicator off.

use std::time::{Duration, Instant};

const PHASE: Duration = Duration::from_millis(200);
const CYCLES: u32 = 3;

#[derive(Debug, Default)]
pub struct BlinkPattern {
    started_at: Option<Instant>,
    /// Last level handed to the indicator
    level: Option<bool>,
}

impl BlinkPattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the pattern at `now`
    pub fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
        self.level = None;
    }

    /// Abandon the pattern without a final write
    pub fn cancel(&mut self) {
        self.started_at = None;
        self.level = None;
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    /// Indicator level to write this tick, only when it changes
    pub fn poll(&mut self, now: Instant) -> Option<bool> {
        let started_at = self.started_at?;
        let elapsed = now.saturating_duration_since(started_at);
        let phase = (elapsed.as_millis() / PHASE.as_millis()) as u64;

        let desired = if phase >= u64::from(CYCLES) * 2 {
            self.started_at = None;
            false
        } else {
            phase % 2 == 0
        };

        if self.level == Some(desired) {
            return None;
        }
        self.level = if self.started_at.is_some() { Some(desired) } else { None };
        Some(desired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(blink: &mut BlinkPattern, t0: Instant, until_ms: u64) -> Vec<(u64, bool)> {
        let mut out = Vec::new();
        for ms in (0..=until_ms).step_by(10) {
            if let Some(level) = blink.poll(t0 + Duration::from_millis(ms)) {
                out.push((ms, level));
            }
        }
        out
    }

    #[test]
    fn test_three_cycles_then_off() {
        let mut blink = BlinkPattern::new();
        let t0 = Instant::now();
        blink.start(t0);

        let writes = levels(&mut blink, t0, 2000);
        assert_eq!(
            writes,
            vec![
                (0, true),
                (200, false),
                (400, true),
                (600, false),
                (800, true),
                (1000, false),
            ]
        );
        assert!(!blink.is_active());
    }

    #[test]
    fn test_idle_pattern_writes_nothing() {
        let mut blink = BlinkPattern::new();
        assert_eq!(blink.poll(Instant::now()), None);
    }

    #[test]
    fn test_cancel_stops_pattern() {
        let mut blink = BlinkPattern::new();
        let t0 = Instant::now();
        blink.start(t0);
        assert_eq!(blink.poll(t0), Some(true));

        blink.cancel();
        assert!(!blink.is_active());
        assert_eq!(blink.poll(t0 + Duration::from_millis(200)), None);
    }

    #[test]
    fn test_late_poll_still_ends_off() {
        let mut blink = BlinkPattern::new();
        let t0 = Instant::now();
        blink.start(t0);

        assert_eq!(blink.poll(t0 + Duration::from_secs(5)), Some(false));
        assert!(!blink.is_active());
    }
}
