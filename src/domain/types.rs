//! Shared types for the hallway monitor

use serde::Serialize;

/// Which end of the corridor a beam guards.
///
/// The left beam is the configured "entry" beam; it wins ties when both
/// beams break in the same tick while the corridor is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BeamSide {
    Left,
    Right,
}

impl BeamSide {
    /// The beam at the other end of the corridor
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            BeamSide::Left => BeamSide::Right,
            BeamSide::Right => BeamSide::Left,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BeamSide::Left => "left",
            BeamSide::Right => "right",
        }
    }
}

impl std::fmt::Display for BeamSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of travel through the corridor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    LeftToRight,
    RightToLeft,
}

impl Direction {
    /// Direction of an object that entered through `side`
    #[inline]
    pub fn entering_from(side: BeamSide) -> Self {
        match side {
            BeamSide::Left => Direction::LeftToRight,
            BeamSide::Right => Direction::RightToLeft,
        }
    }

    /// Beam the object broke on the way in
    #[inline]
    pub fn near_side(self) -> BeamSide {
        match self {
            Direction::LeftToRight => BeamSide::Left,
            Direction::RightToLeft => BeamSide::Right,
        }
    }

    /// Beam the object must break to leave correctly
    #[inline]
    pub fn far_side(self) -> BeamSide {
        self.near_side().opposite()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::LeftToRight => "left_to_right",
            Direction::RightToLeft => "right_to_left",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instantaneous state of a single break-beam sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeamState {
    /// Beam reaches the photodiode
    Clear,
    /// Something is occluding the beam
    Blocked,
}

impl BeamState {
    #[inline]
    pub fn is_blocked(self) -> bool {
        self == BeamState::Blocked
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BeamState::Clear => "clear",
            BeamState::Blocked => "blocked",
        }
    }
}

/// Both beams, sampled once per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorPair {
    pub left: BeamState,
    pub right: BeamState,
}

impl SensorPair {
    pub const CLEAR: SensorPair = SensorPair { left: BeamState::Clear, right: BeamState::Clear };

    pub fn new(left: BeamState, right: BeamState) -> Self {
        Self { left, right }
    }

    #[inline]
    pub fn side(&self, side: BeamSide) -> BeamState {
        match side {
            BeamSide::Left => self.left,
            BeamSide::Right => self.right,
        }
    }

    #[inline]
    pub fn is_blocked(&self, side: BeamSide) -> bool {
        self.side(side).is_blocked()
    }

    #[inline]
    pub fn all_clear(&self) -> bool {
        !self.left.is_blocked() && !self.right.is_blocked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_sides() {
        let d = Direction::entering_from(BeamSide::Left);
        assert_eq!(d, Direction::LeftToRight);
        assert_eq!(d.near_side(), BeamSide::Left);
        assert_eq!(d.far_side(), BeamSide::Right);

        let d = Direction::entering_from(BeamSide::Right);
        assert_eq!(d.near_side(), BeamSide::Right);
        assert_eq!(d.far_side(), BeamSide::Left);
    }

    #[test]
    fn test_sensor_pair_lookup() {
        let pair = SensorPair::new(BeamState::Blocked, BeamState::Clear);
        assert!(pair.is_blocked(BeamSide::Left));
        assert!(!pair.is_blocked(BeamSide::Right));
        assert!(!pair.all_clear());
        assert!(SensorPair::CLEAR.all_clear());
    }
}
