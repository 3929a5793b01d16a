//! Metrics collection and exposition.
//!
//! # Metrics
//! - `image_requests_total` (counter): lookups by `source` (cache, origin) and `outcome`
//! - `image_origin_fetch_latency_seconds` (histogram): origin fetch time, retries included
//! - `image_origin_attempts_total` (counter): single origin attempts by outcome
//! - `image_circuit_open` (gauge): 1 while the circuit is open
//! - `image_origin_inflight` (gauge): origin fetches holding a permit
//! - `image_cache_store_errors_total` (counter): store failures by operation

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

const LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0];

/// Install the Prometheus recorder and its scrape listener. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full("image_origin_fetch_latency_seconds".into()),
            LATENCY_BUCKETS,
        )?
        .install()?;

    metrics::describe_counter!("image_requests_total", "Image lookups by source and outcome");
    metrics::describe_histogram!(
        "image_origin_fetch_latency_seconds",
        metrics::Unit::Seconds,
        "Origin fetch latency including retries"
    );
    metrics::describe_counter!("image_origin_attempts_total", "Single origin attempts by outcome");
    metrics::describe_gauge!("image_circuit_open", "1 while the origin circuit is open");
    metrics::describe_gauge!("image_origin_inflight", "Origin fetches in flight");
    metrics::describe_counter!("image_cache_store_errors_total", "Cache store failures by operation");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_lookup(source: &'static str, outcome: &'static str) {
    counter!("image_requests_total", "source" => source, "outcome" => outcome).increment(1);
}

pub fn record_origin_attempt(outcome: &'static str) {
    counter!("image_origin_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_origin_latency(elapsed: Duration) {
    histogram!("image_origin_fetch_latency_seconds").record(elapsed.as_secs_f64());
}

pub fn set_circuit_open(open: bool) {
    gauge!("image_circuit_open").set(if open { 1.0 } else { 0.0 });
}

pub fn set_origin_inflight(in_flight: usize) {
    gauge!("image_origin_inflight").set(in_flight as f64);
}

pub fn record_store_error(op: &'static str) {
    counter!("image_cache_store_errors_total", "op" => op).increment(1);
}
