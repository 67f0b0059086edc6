//! Hardware watchdog liveness adapter
//!
//! Opens the Linux watchdog character device, negotiates its timeout once and
//! pets it through the keep-alive ioctl. The device is never magic-closed: if
//! the process dies the host resets.

use crate::io::ports::LivenessPort;
use anyhow::Context;
use nix::libc::c_int;
use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use tracing::{info, warn};

nix::ioctl_read!(wdioc_keepalive, b'W', 5, c_int);
nix::ioctl_readwrite!(wdioc_settimeout, b'W', 6, c_int);
nix::ioctl_read!(wdioc_gettimeout, b'W', 7, c_int);

pub struct DeviceWatchdog {
    file: File,
    timeout_secs: u32,
}

impl DeviceWatchdog {
    /// Open `device` and request `requested_secs`. The device may round the
    /// timeout; the value it settles on is the one reported afterwards.
    pub fn open(device: &str, requested_secs: u32) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .open(device)
            .with_context(|| format!("Failed to open watchdog device {device}"))?;
        let fd = file.as_raw_fd();

        let mut timeout = c_int::try_from(requested_secs).context("Watchdog timeout too large")?;
        // SAFETY: fd is an open watchdog descriptor owned by `file`; timeout outlives the call
        unsafe { wdioc_settimeout(fd, &mut timeout) }
            .with_context(|| format!("Failed to set watchdog timeout on {device}"))?;

        let mut negotiated: c_int = 0;
        // SAFETY: as above
        unsafe { wdioc_gettimeout(fd, &mut negotiated) }
            .with_context(|| format!("Failed to read watchdog timeout from {device}"))?;

        let timeout_secs = u32::try_from(negotiated).unwrap_or(requested_secs);
        if timeout_secs != requested_secs {
            warn!(requested = %requested_secs, negotiated = %timeout_secs, "watchdog_timeout_adjusted");
        }
        info!(device = %device, timeout_secs = %timeout_secs, "watchdog_armed");

        Ok(Self { file, timeout_secs })
    }
}

impl LivenessPort for DeviceWatchdog {
    fn acknowledge(&mut self) -> anyhow::Result<()> {
        let mut dummy: c_int = 0;
        // SAFETY: fd is an open watchdog descriptor owned by `self.file`
        unsafe { wdioc_keepalive(self.file.as_raw_fd(), &mut dummy) }
            .context("Watchdog keep-alive failed")?;
        Ok(())
    }

    fn timeout_secs(&self) -> u32 {
        self.timeout_secs
    }
}

/// Stand-in when no watchdog is configured (development hosts)
#[derive(Debug, Clone, Copy)]
pub struct NoopLiveness {
    timeout_secs: u32,
}

impl NoopLiveness {
    pub fn new(timeout_secs: u32) -> Self {
        warn!("watchdog_disabled");
        Self { timeout_secs }
    }
}

impl LivenessPort for NoopLiveness {
    fn acknowledge(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn timeout_secs(&self) -> u32 {
        self.timeout_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_fails() {
        let result = DeviceWatchdog::open("/nonexistent/watchdog", 15);
        assert!(result.is_err());
    }

    #[test]
    fn test_noop_always_acknowledges() {
        let mut liveness = NoopLiveness::new(15);
        assert!(liveness.acknowledge().is_ok());
        assert_eq!(liveness.timeout_secs(), 15);
    }
}
