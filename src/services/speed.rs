//! Speed calculation from transit duration

use crate::domain::speed::SpeedSample;

/// Converts a transit duration into a speed over the fixed inter-beam distance
#[derive(Debug, Clone, Copy)]
pub struct SpeedCalculator {
    distance_m: f64,
}

impl SpeedCalculator {
    pub fn new(distance_m: f64) -> Self {
        Self { distance_m }
    }

    /// Speed for a transit of `elapsed_secs` whole seconds
    pub fn speed(&self, elapsed_secs: u64) -> SpeedSample {
        if elapsed_secs == 0 {
            return SpeedSample::Unmeasurable;
        }
        SpeedSample::Measured(self.distance_m / elapsed_secs as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_over_distance() {
        let calc = SpeedCalculator::new(3.0);
        assert_eq!(calc.speed(4), SpeedSample::Measured(0.75));
        assert_eq!(calc.speed(2), SpeedSample::Measured(1.5));
        assert_eq!(calc.speed(3), SpeedSample::Measured(1.0));
    }

    #[test]
    fn test_zero_duration_is_unmeasurable() {
        let calc = SpeedCalculator::new(3.0);
        assert_eq!(calc.speed(0), SpeedSample::Unmeasurable);
    }
}
