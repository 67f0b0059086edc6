//! IO modules - external system interfaces
//!
//! This module contains all hardware and file IO:
//! - `ports` - Traits the tick loop talks to (sensors, indicators, liveness)
//! - `gpio` - Sysfs GPIO adapters for the beams and LEDs
//! - `watchdog` - Linux watchdog device adapter
//! - `event_log` - Log and stats output to file (JSONL format)
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod event_log;
pub mod gpio;
pub mod ports;
pub mod prometheus;
pub mod watchdog;

// Re-export commonly used types
pub use event_log::EventLog;
pub use gpio::{GpioBeams, GpioIndicators};
pub use ports::{IndicatorPort, LivenessPort, SensorPort};
pub use watchdog::{DeviceWatchdog, NoopLiveness};
