//! Speed samples produced by completed traversals

/// Speed of one completed traversal.
///
/// A transit measured as zero whole seconds has no meaningful speed; it is
/// carried as `Unmeasurable` and is never compared against the limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedSample {
    /// Metres per second
    Measured(f64),
    /// Duration was zero: anomalously fast
    Unmeasurable,
}

impl SpeedSample {
    /// Numeric speed, if there is one
    #[inline]
    pub fn mps(&self) -> Option<f64> {
        match *self {
            SpeedSample::Measured(v) => Some(v),
            SpeedSample::Unmeasurable => None,
        }
    }

    #[inline]
    pub fn is_unmeasurable(&self) -> bool {
        matches!(self, SpeedSample::Unmeasurable)
    }

    /// Amount by which the sample is strictly over `limit_mps`
    pub fn excess_over(&self, limit_mps: f64) -> Option<f64> {
        match *self {
            SpeedSample::Measured(v) if v > limit_mps => Some(v - limit_mps),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excess_over() {
        assert_eq!(SpeedSample::Measured(1.5).excess_over(1.0), Some(0.5));
        assert_eq!(SpeedSample::Measured(1.0).excess_over(1.0), None);
        assert_eq!(SpeedSample::Measured(0.75).excess_over(1.0), None);
    }

    #[test]
    fn test_unmeasurable_never_exceeds() {
        assert_eq!(SpeedSample::Unmeasurable.excess_over(0.0), None);
        assert_eq!(SpeedSample::Unmeasurable.mps(), None);
        assert!(SpeedSample::Unmeasurable.is_unmeasurable());
    }

    #[test]
    fn test_zero_limit_flags_any_measured_speed() {
        assert!(SpeedSample::Measured(0.01).excess_over(0.0).is_some());
    }
}
