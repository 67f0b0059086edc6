//! Domain models - core types of the corridor monitor
//!
//! This module contains the canonical data types used throughout the system:
//! - `types` - beams, directions and the per-tick `SensorPair`
//! - `session` - the single in-flight `TraversalSession` and its timers
//! - `speed` - `SpeedSample`, including the unmeasurable sentinel
//! - `stats` - `StatsReport` for a closed statistics window
//! - `event` - `MonitorEvent` and the `LogRecord` written to the event sink

pub mod event;
pub mod session;
pub mod speed;
pub mod stats;
pub mod types;
