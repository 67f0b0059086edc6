//! Event sink files - log records and stats reports
//!
//! Both files are JSONL (one JSON object per line), appended to and never
//! truncated. Paths come from config.

use crate::domain::event::LogRecord;
use crate::domain::stats::StatsReport;
use anyhow::Context;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writer for the event log and the stats file
pub struct EventLog {
    log_path: PathBuf,
    stats_path: PathBuf,
}

impl EventLog {
    /// Open both sinks, creating files and parent directories.
    ///
    /// Fails if either file cannot be created; this is fatal at startup.
    pub fn open(log_path: &str, stats_path: &str) -> anyhow::Result<Self> {
        let sink = Self { log_path: PathBuf::from(log_path), stats_path: PathBuf::from(stats_path) };

        for path in [&sink.log_path, &sink.stats_path] {
            ensure_parent(path)?;
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open sink file {}", path.display()))?;
        }

        info!(log_file = %log_path, stats_file = %stats_path, "event_log_initialized");
        Ok(sink)
    }

    /// Append one record to the event log
    pub fn write_log(&self, record: &LogRecord) -> anyhow::Result<()> {
        let line = serde_json::to_string(record).context("Failed to encode log record")?;
        append_line(&self.log_path, &line)
    }

    /// Append one report to the stats file
    pub fn write_stats(&self, report: &StatsReport) -> anyhow::Result<()> {
        append_line(&self.stats_path, &report.to_json().to_string())
    }
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

fn append_line(path: &Path, line: &str) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    writeln!(file, "{}", line).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(file = %path.display(), bytes = %line.len(), "sink_written");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::MonitorEvent;
    use crate::domain::stats::SpeedSummary;
    use crate::domain::types::Direction;
    use chrono::DateTime;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_files_and_dirs() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("var/log/hallway.log.jsonl");
        let stats = dir.path().join("var/log/hallway.stats.jsonl");

        EventLog::open(log.to_str().unwrap(), stats.to_str().unwrap()).unwrap();

        assert!(log.exists());
        assert!(stats.exists());
    }

    #[test]
    fn test_open_fails_on_unwritable_path() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        // Parent is a regular file, so the sink cannot be created
        let log = blocker.join("hallway.log.jsonl");

        let result = EventLog::open(log.to_str().unwrap(), "unused.jsonl");
        assert!(result.is_err());
    }

    #[test]
    fn test_write_log_appends_jsonl() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("log.jsonl");
        let stats = dir.path().join("stats.jsonl");
        let sink = EventLog::open(log.to_str().unwrap(), stats.to_str().unwrap()).unwrap();

        let at = DateTime::from_timestamp(1_767_617_600, 0).unwrap();
        let passed = MonitorEvent::Passed { direction: Direction::LeftToRight, speed_mps: 0.75 };
        sink.write_log(&LogRecord::new(at, &passed, None)).unwrap();
        sink.write_log(&LogRecord::new(at, &MonitorEvent::MonitorStarted, None)).unwrap();

        let content = fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "passed");
        assert_eq!(first["value"], 0.75);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "monitor_started");
        assert!(second.get("value").is_none());
    }

    #[test]
    fn test_write_stats() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("log.jsonl");
        let stats = dir.path().join("stats.jsonl");
        let sink = EventLog::open(log.to_str().unwrap(), stats.to_str().unwrap()).unwrap();

        let at = DateTime::from_timestamp(1_767_617_600, 0).unwrap();
        let report = StatsReport {
            window_start: at,
            window_end: at,
            pass_count: 0,
            speeder_count: 0,
            anomaly_count: 0,
            samples_dropped: 0,
            speeds: SpeedSummary::NoTraffic,
        };
        sink.write_stats(&report).unwrap();

        let content = fs::read_to_string(&stats).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed["no_traffic"], true);
        assert!(content.ends_with('\n'));
    }
}
