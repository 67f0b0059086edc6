//! Hardware ports consumed by the monitor
//!
//! The tick loop only talks to hardware through these traits. Production
//! adapters live in `gpio` and `watchdog`; tests provide scripted fakes.

use crate::domain::types::{BeamSide, BeamState, SensorPair};

/// Break-beam sensors at both ends of the corridor
pub trait SensorPort {
    fn read(&mut self, side: BeamSide) -> anyhow::Result<BeamState>;

    /// Sample both beams for one tick
    fn read_pair(&mut self) -> anyhow::Result<SensorPair> {
        let left = self.read(BeamSide::Left)?;
        let right = self.read(BeamSide::Right)?;
        Ok(SensorPair::new(left, right))
    }
}

/// Running and warning indicators
pub trait IndicatorPort {
    fn set_running(&mut self, on: bool) -> anyhow::Result<()>;
    fn set_warning(&mut self, on: bool) -> anyhow::Result<()>;
}

/// Hardware watchdog keep-alive
pub trait LivenessPort {
    /// Must be called at least once per `timeout_secs`
    fn acknowledge(&mut self) -> anyhow::Result<()>;

    /// Timeout negotiated with the device at startup
    fn timeout_secs(&self) -> u32;
}

impl<T: SensorPort + ?Sized> SensorPort for Box<T> {
    fn read(&mut self, side: BeamSide) -> anyhow::Result<BeamState> {
        (**self).read(side)
    }
}

impl<T: IndicatorPort + ?Sized> IndicatorPort for Box<T> {
    fn set_running(&mut self, on: bool) -> anyhow::Result<()> {
        (**self).set_running(on)
    }

    fn set_warning(&mut self, on: bool) -> anyhow::Result<()> {
        (**self).set_warning(on)
    }
}

impl<T: LivenessPort + ?Sized> LivenessPort for Box<T> {
    fn acknowledge(&mut self) -> anyhow::Result<()> {
        (**self).acknowledge()
    }

    fn timeout_secs(&self) -> u32 {
        (**self).timeout_secs()
    }
}
