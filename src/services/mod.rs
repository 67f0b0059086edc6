//! Services - the monitor core and its integration
//!
//! This module contains the logic that decides who is in the hall, which way
//! they are going, how fast, and whether they are lingering:
//! - `traversal` - Single-session traversal state machine
//! - `safety` - Repeated blockage and one-shot hallway timers
//! - `speed` - Speed from transit duration
//! - `stats` - Rolling statistics window
//! - `blink` - Non-blocking warning blink pattern
//! - `connectivity` - Pre-loop beam check with bounded retry
//! - `sink_worker` - Background writer for log and stats records
//! - `monitor` - Tick loop tying it all together

pub mod blink;
pub mod connectivity;
pub mod monitor;
pub mod safety;
pub mod sink_worker;
pub mod speed;
pub mod stats;
pub mod traversal;

// Re-export commonly used types
pub use connectivity::{await_clear_beams, ConnectivityError, RetryPolicy};
pub use monitor::{publish, Monitor};
pub use sink_worker::{create_sink_worker, SinkRecord, SinkSender, SinkWorker};
pub use traversal::TraversalStateMachine;
