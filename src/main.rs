//! Hallway monitor - break-beam speed and one-way traffic monitor
//!
//! Runs unattended on a Raspberry Pi class host: samples two photodiodes,
//! tracks each object through the corridor, flags speeders and lingerers,
//! writes periodic statistics and keeps the hardware watchdog fed.
//!
//! Module structure:
//! - `domain/` - Core types (beams, sessions, speed samples, events, reports)
//! - `io/` - External interfaces (GPIO, watchdog, sink files, Prometheus)
//! - `services/` - Core logic (state machine, timers, stats, tick loop)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use hallway_monitor::domain::event::MonitorEvent;
use hallway_monitor::infra::{Config, Metrics};
use hallway_monitor::io::{
    DeviceWatchdog, EventLog, GpioBeams, GpioIndicators, IndicatorPort, LivenessPort,
    NoopLiveness,
};
use hallway_monitor::services::{
    await_clear_beams, create_sink_worker, publish, Monitor, RetryPolicy, SinkSender,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Hallway monitor - break-beam speed and traffic monitor
#[derive(Parser, Debug)]
#[command(name = "hallway-monitor", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then /etc)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for per-session traversal events
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(version = %env!("CARGO_PKG_VERSION"), git = %env!("GIT_HASH"), "hallway-monitor starting");

    let args = Args::parse();
    let config_path = Config::resolve_config_path(args.config.as_deref());

    let config = Config::load(&config_path).inspect_err(|e| {
        error!(config_file = %config_path, error = %format!("{e:#}"), "config_load_failed");
    })?;

    info!(
        config_file = %config.config_file(),
        site = %config.site_id(),
        speed_limit_mps = %config.speed_limit_mps(),
        beam_distance_m = %config.beam_distance_m(),
        stats_period_secs = %config.stats_period().as_secs(),
        tick_ms = %config.tick_period().as_millis(),
        watchdog_enabled = %config.watchdog_enabled(),
        prometheus_port = %config.prometheus_port(),
        "config_loaded"
    );

    let metrics = Arc::new(Metrics::new());

    let sink = EventLog::open(config.log_file(), config.stats_file()).inspect_err(|e| {
        error!(error = %format!("{e:#}"), "event_log_open_failed");
    })?;
    let (sink_tx, worker) = create_sink_worker(sink, metrics.clone(), config.sink_channel_capacity());
    let sink_handle = tokio::spawn(worker.run());

    let result = run(&config, metrics, &sink_tx).await;

    if let Err(e) = &result {
        let event = MonitorEvent::StartupFailed { reason: format!("{e:#}") };
        publish(&sink_tx, Utc::now(), &event, None);
    }

    // Let the writer drain everything queued so far
    drop(sink_tx);
    let _ = sink_handle.await;

    info!("hallway-monitor shutdown complete");
    result
}

/// Bring up hardware, check the beams, then run the tick loop until Ctrl+C
async fn run(config: &Config, metrics: Arc<Metrics>, sink: &SinkSender) -> anyhow::Result<()> {
    let mut sensors = GpioBeams::open(config).context("Beam sensors unavailable")?;
    let mut indicators = GpioIndicators::open(config).context("Indicators unavailable")?;

    let mut liveness: Box<dyn LivenessPort> = if config.watchdog_enabled() {
        Box::new(
            DeviceWatchdog::open(config.watchdog_device(), config.watchdog_timeout_secs())
                .context("Watchdog unavailable")?,
        )
    } else {
        Box::new(NoopLiveness::new(config.watchdog_timeout_secs()))
    };

    indicators.set_running(true).context("Failed to light running indicator")?;
    indicators.set_warning(false).context("Failed to clear warning indicator")?;

    if config.speed_limit_mps() == 0.0 {
        publish(sink, Utc::now(), &MonitorEvent::SpeedLimitZero, None);
    }

    let policy = RetryPolicy::from_config(config);
    await_clear_beams(&mut sensors, &mut liveness, &policy, |event| {
        publish(sink, Utc::now(), &event, None)
    })
    .await
    .context("Beam connectivity check failed")?;

    // Create shutdown signal for background tasks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start Prometheus metrics HTTP server (if port > 0)
    let prometheus_port = config.prometheus_port();
    if prometheus_port > 0 {
        let prom_metrics = metrics.clone();
        let site_id = config.site_id().to_string();
        let prom_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = hallway_monitor::io::prometheus::start_metrics_server(
                prometheus_port,
                prom_metrics,
                site_id,
                prom_shutdown,
            )
            .await
            {
                error!(error = %e, "prometheus_metrics_server_error");
            }
        });
    }

    // Start metrics reporter (lock-free reads with full summary)
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    let mut monitor = Monitor::new(config, sensors, indicators, liveness, sink.clone(), metrics);
    publish(sink, Utc::now(), &MonitorEvent::MonitorStarted, None);

    tokio::select! {
        _ = monitor.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown_signal_received");
        }
    }

    let _ = shutdown_tx.send(true);
    Ok(())
}
