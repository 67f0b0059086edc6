//! Sysfs GPIO adapters for the beams and indicators
//!
//! Pins are exported on demand under the configured sysfs root. A photodiode
//! reads `1` while its laser reaches it and `0` when the beam is broken.

use crate::domain::types::{BeamSide, BeamState};
use crate::infra::config::Config;
use crate::io::ports::{IndicatorPort, SensorPort};
use anyhow::{bail, Context};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinDirection {
    In,
    Out,
}

impl PinDirection {
    fn as_str(&self) -> &'static str {
        match self {
            PinDirection::In => "in",
            PinDirection::Out => "out",
        }
    }
}

/// One exported sysfs GPIO line
#[derive(Debug)]
pub struct SysfsPin {
    pin: u8,
    value_path: PathBuf,
}

impl SysfsPin {
    /// Export `pin` if needed and set its direction
    pub fn open(root: &Path, pin: u8, direction: PinDirection) -> anyhow::Result<Self> {
        let dir = root.join(format!("gpio{pin}"));

        if !dir.exists() {
            fs::write(root.join("export"), pin.to_string())
                .with_context(|| format!("Failed to export gpio{pin}"))?;
            if !dir.exists() {
                bail!("gpio{pin} did not appear under {} after export", root.display());
            }
        }

        fs::write(dir.join("direction"), direction.as_str())
            .with_context(|| format!("Failed to set gpio{pin} direction"))?;

        info!(pin = %pin, direction = %direction.as_str(), "gpio_pin_opened");
        Ok(Self { pin, value_path: dir.join("value") })
    }

    pub fn read_level(&self) -> anyhow::Result<bool> {
        let raw = fs::read_to_string(&self.value_path)
            .with_context(|| format!("Failed to read gpio{}", self.pin))?;
        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => bail!("gpio{} returned unexpected value {:?}", self.pin, other),
        }
    }

    pub fn write_level(&self, high: bool) -> anyhow::Result<()> {
        fs::write(&self.value_path, if high { "1" } else { "0" })
            .with_context(|| format!("Failed to write gpio{}", self.pin))
    }
}

/// Both photodiodes
pub struct GpioBeams {
    left: SysfsPin,
    right: SysfsPin,
}

impl GpioBeams {
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let root = Path::new(config.gpio_sysfs_root());
        Ok(Self {
            left: SysfsPin::open(root, config.entry_beam_pin(), PinDirection::In)?,
            right: SysfsPin::open(root, config.exit_beam_pin(), PinDirection::In)?,
        })
    }
}

impl SensorPort for GpioBeams {
    fn read(&mut self, side: BeamSide) -> anyhow::Result<BeamState> {
        let pin = match side {
            BeamSide::Left => &self.left,
            BeamSide::Right => &self.right,
        };
        Ok(if pin.read_level()? { BeamState::Clear } else { BeamState::Blocked })
    }
}

/// Running and warning LEDs
pub struct GpioIndicators {
    running: SysfsPin,
    warning: SysfsPin,
}

impl GpioIndicators {
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let root = Path::new(config.gpio_sysfs_root());
        Ok(Self {
            running: SysfsPin::open(root, config.running_led_pin(), PinDirection::Out)?,
            warning: SysfsPin::open(root, config.warning_led_pin(), PinDirection::Out)?,
        })
    }
}

impl IndicatorPort for GpioIndicators {
    fn set_running(&mut self, on: bool) -> anyhow::Result<()> {
        self.running.write_level(on)
    }

    fn set_warning(&mut self, on: bool) -> anyhow::Result<()> {
        self.warning.write_level(on)
    }
}
