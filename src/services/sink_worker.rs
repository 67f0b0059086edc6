//! Event sink worker - writes log and stats records off the tick loop
//!
//! The tick loop must never block on file I/O, so it hands records to this
//! worker through bounded mpsc channels. Log records and stats reports travel
//! on separate channels. A log record that finds its channel full is dropped
//! and counted; a stats report is handed back to the caller instead, so a
//! closed window is never lost to log traffic.

use crate::domain::event::LogRecord;
use crate::domain::stats::StatsReport;
use crate::infra::metrics::Metrics;
use crate::io::event_log::EventLog;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{error, info, warn};

/// Closed windows that may wait for the writer at once
const STATS_QUEUE_CAPACITY: usize = 4;

/// A record bound for one of the sink files
#[derive(Debug)]
pub enum SinkRecord {
    Log(LogRecord),
    Stats(StatsReport),
}

#[derive(Debug)]
struct Envelope<T> {
    record: T,
    /// When the record was enqueued (for queue delay measurement)
    enqueued_at: Instant,
}

impl<T> Envelope<T> {
    fn new(record: T) -> Self {
        Self { record, enqueued_at: Instant::now() }
    }
}

/// Non-blocking handle used by the tick loop
#[derive(Clone)]
pub struct SinkSender {
    log_tx: mpsc::Sender<Envelope<LogRecord>>,
    stats_tx: mpsc::Sender<Envelope<StatsReport>>,
    metrics: Arc<Metrics>,
}

impl SinkSender {
    /// Enqueue a log record. Returns false if it was dropped.
    pub fn send_log(&self, record: LogRecord) -> bool {
        match self.log_tx.try_send(Envelope::new(record)) {
            Ok(()) => true,
            Err(TrySendError::Full(env)) => {
                self.metrics.record_sink_dropped();
                warn!(event = %env.record.event, "sink_record_dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.record_sink_dropped();
                false
            }
        }
    }

    /// Enqueue a stats report. A report that cannot be queued comes back
    /// to the caller, who keeps it until a later attempt succeeds.
    pub fn send_stats(&self, report: StatsReport) -> Result<(), StatsReport> {
        self.stats_tx
            .try_send(Envelope::new(report))
            .map_err(|e| match e {
                TrySendError::Full(env) | TrySendError::Closed(env) => env.record,
            })
    }
}

impl SinkRecord {
    fn kind(&self) -> &'static str {
        match self {
            SinkRecord::Log(_) => "log",
            SinkRecord::Stats(_) => "stats",
        }
    }
}

/// Worker that drains both channels into the sink files
pub struct SinkWorker {
    sink: EventLog,
    log_rx: mpsc::Receiver<Envelope<LogRecord>>,
    stats_rx: mpsc::Receiver<Envelope<StatsReport>>,
    metrics: Arc<Metrics>,
}

impl SinkWorker {
    /// Run the worker, writing records until every sender is dropped
    pub async fn run(mut self) {
        info!("sink_worker_started");

        loop {
            // Stats first: a waiting report holds a whole window
            let (record, enqueued_at) = tokio::select! {
                biased;
                Some(env) = self.stats_rx.recv() => (SinkRecord::Stats(env.record), env.enqueued_at),
                Some(env) = self.log_rx.recv() => (SinkRecord::Log(env.record), env.enqueued_at),
                else => break,
            };
            self.write(record, enqueued_at);
        }

        info!("sink_worker_stopped");
    }

    fn write(&mut self, record: SinkRecord, enqueued_at: Instant) {
        let queue_delay_us = enqueued_at.elapsed().as_micros() as u64;

        let result = match &record {
            SinkRecord::Log(log) => self.sink.write_log(log),
            SinkRecord::Stats(report) => self.sink.write_stats(report),
        };

        if let Err(e) = result {
            self.metrics.record_sink_write_error();
            error!(kind = %record.kind(), error = %format!("{e:#}"), "sink_write_failed");
        }

        // Warn if queue delay exceeds 100ms - indicates backlog
        if queue_delay_us > 100_000 {
            warn!(queue_delay_us = %queue_delay_us, "sink_queue_delay_high");
        }
    }
}

#[cfg(test)]
impl SinkWorker {
    /// Take everything queued so far without writing it
    pub(crate) fn drain(&mut self) -> Vec<SinkRecord> {
        let mut out = Vec::new();
        while let Ok(env) = self.log_rx.try_recv() {
            out.push(SinkRecord::Log(env.record));
        }
        while let Ok(env) = self.stats_rx.try_recv() {
            out.push(SinkRecord::Stats(env.record));
        }
        out
    }
}

/// Create the sink channels and worker
///
/// `buffer_size` bounds the log channel. Returns the sender (for the tick
/// loop) and the worker (to be spawned)
pub fn create_sink_worker(
    sink: EventLog,
    metrics: Arc<Metrics>,
    buffer_size: usize,
) -> (SinkSender, SinkWorker) {
    let (log_tx, log_rx) = mpsc::channel(buffer_size);
    let (stats_tx, stats_rx) = mpsc::channel(STATS_QUEUE_CAPACITY);
    let sender = SinkSender { log_tx, stats_tx, metrics: metrics.clone() };
    let worker = SinkWorker { sink, log_rx, stats_rx, metrics };
    (sender, worker)
}
