//! Prometheus metrics HTTP endpoint
//!
//! Exposes monitor metrics in Prometheus text format at /metrics.
//! Uses hyper for the HTTP server.

use crate::infra::metrics::{Metrics, MetricsSummary, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS};
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with site label
fn write_metric(
    output: &mut String,
    name: &str,
    help: &str,
    typ: MetricType,
    site: &str,
    val: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{site=\"{site}\"}} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    site: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    bounds: &[u64; 10],
    sum: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in bounds.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"+Inf\"}} {cumulative}");

    let count: u64 = buckets.iter().sum();
    let _ = writeln!(output, "{name}_sum{{site=\"{site}\"}} {sum}");
    let _ = writeln!(output, "{name}_count{{site=\"{site}\"}} {count}");
}

/// Format metrics in Prometheus text exposition format
fn format_prometheus_metrics(metrics: &Metrics, site_id: &str) -> String {
    // Scrapes must not reset what the periodic log reporter consumes
    let summary = metrics.snapshot();
    let mut output = String::with_capacity(4096);

    write_tick_metrics(&mut output, site_id, &summary);
    write_traffic_metrics(&mut output, site_id, &summary);
    write_warning_metrics(&mut output, site_id, &summary);
    write_fault_metrics(&mut output, site_id, &summary);

    output
}

fn write_tick_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "hallway_ticks_total",
        "Total monitor ticks run",
        MetricType::Counter,
        site,
        summary.ticks_total,
    );
    let _ = writeln!(output, "# HELP hallway_ticks_per_sec Monitor ticks per second");
    let _ = writeln!(output, "# TYPE hallway_ticks_per_sec gauge");
    let _ =
        writeln!(output, "hallway_ticks_per_sec{{site=\"{site}\"}} {:.2}", summary.ticks_per_sec);

    write_histogram(
        output,
        "hallway_tick_latency_us",
        "Tick processing latency in microseconds",
        site,
        &summary.lat_buckets,
        &METRICS_BUCKET_BOUNDS,
        summary.lat_sum_us,
    );
    write_metric(
        output,
        "hallway_tick_latency_p99_us",
        "99th percentile tick latency",
        MetricType::Gauge,
        site,
        summary.lat_p99_us,
    );
    write_metric(
        output,
        "hallway_tick_latency_max_us",
        "Maximum tick latency since start",
        MetricType::Gauge,
        site,
        summary.max_tick_latency_us,
    );
}

fn write_traffic_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "hallway_passes_total",
        "Completed transits",
        MetricType::Counter,
        site,
        summary.passes_total,
    );
    write_metric(
        output,
        "hallway_speeders_total",
        "Transits over the speed limit",
        MetricType::Counter,
        site,
        summary.speeders_total,
    );
    write_metric(
        output,
        "hallway_anomalies_total",
        "Transits too fast to measure",
        MetricType::Counter,
        site,
        summary.anomalies_total,
    );
    write_metric(
        output,
        "hallway_reversals_total",
        "Objects that turned around inside the hall",
        MetricType::Counter,
        site,
        summary.reversals_total,
    );
    write_metric(
        output,
        "hallway_stats_flushes_total",
        "Statistics windows closed",
        MetricType::Counter,
        site,
        summary.stats_flushes_total,
    );
    write_metric(
        output,
        "hallway_samples_dropped_total",
        "Speed samples not retained because a window was full",
        MetricType::Counter,
        site,
        summary.samples_dropped,
    );
    write_metric(
        output,
        "hallway_occupancy",
        "Corridor occupancy (0=idle, 1=entering, 2=traversing, 3=exiting)",
        MetricType::Gauge,
        site,
        summary.occupancy,
    );
}

fn write_warning_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "hallway_blockage_warnings_total",
        "Beam blocked warnings raised",
        MetricType::Counter,
        site,
        summary.blockage_warnings_total,
    );
    write_metric(
        output,
        "hallway_hallway_warnings_total",
        "Hallway blocked warnings raised",
        MetricType::Counter,
        site,
        summary.hallway_warnings_total,
    );
}

fn write_fault_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "hallway_sensor_errors_total",
        "Failed beam reads",
        MetricType::Counter,
        site,
        summary.sensor_errors_total,
    );
    write_metric(
        output,
        "hallway_indicator_errors_total",
        "Failed indicator writes",
        MetricType::Counter,
        site,
        summary.indicator_errors_total,
    );
    write_metric(
        output,
        "hallway_liveness_errors_total",
        "Failed watchdog acknowledgments",
        MetricType::Counter,
        site,
        summary.liveness_errors_total,
    );
    write_metric(
        output,
        "hallway_sink_dropped_total",
        "Sink records dropped due to full channel",
        MetricType::Counter,
        site,
        summary.sink_records_dropped,
    );
    write_metric(
        output,
        "hallway_sink_write_errors_total",
        "Sink records the writer failed to persist",
        MetricType::Counter,
        site,
        summary.sink_write_errors,
    );
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
    site_id: Arc<String>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(&metrics, &site_id);
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail"))
        }
        (&Method::GET, "/health") => Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("ok")))
            .expect("static response should not fail")),
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .expect("static response should not fail")),
    }
}

/// Start the Prometheus metrics HTTP server
pub async fn start_metrics_server(
    port: u16,
    metrics: Arc<Metrics>,
    site_id: String,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let site_id = Arc::new(site_id);

    info!(port = %port, site = %site_id, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();
                        let site_id = site_id.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                let site_id = site_id.clone();
                                async move { handle_request(req, metrics, site_id).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "prometheus_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "prometheus_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("prometheus_metrics_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
