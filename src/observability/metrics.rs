//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, status
//! - `gateway_request_duration_seconds` (histogram): handler latency by route
//! - `gateway_cache_lookups_total` (counter): hit / stale / miss
//! - `gateway_cache_entries` (gauge): live cache entries
//! - `gateway_admission_denied_total` (counter): denials by reason
//! - `gateway_upstream_calls_total` (counter): upstream outcomes
//! - `gateway_upstream_duration_seconds` (histogram): upstream latency
//! - `gateway_circuit_open` (gauge): 1=open, 0=closed or half-open
//! - `gateway_pacing_rejected_total` (counter): endpoint pacing rejections
//! - `gateway_background_refresh_total` (counter): refresh outcomes
//!
//! Without an installed recorder every call here is a no-op.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &'static str, status: u16, start: Instant) {
    counter!("gateway_requests_total", "route" => route, "status" => status.to_string())
        .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(outcome: &'static str) {
    counter!("gateway_cache_lookups_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("gateway_cache_entries").set(entries as f64);
}

pub fn record_admission_denied(reason: &'static str) {
    counter!("gateway_admission_denied_total", "reason" => reason).increment(1);
}

pub fn record_upstream_call(outcome: &'static str, start: Instant) {
    counter!("gateway_upstream_calls_total", "outcome" => outcome).increment(1);
    histogram!("gateway_upstream_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_circuit_open(open: bool) {
    gauge!("gateway_circuit_open").set(if open { 1.0 } else { 0.0 });
}

pub fn record_pacing_rejected() {
    counter!("gateway_pacing_rejected_total").increment(1);
}

pub fn record_background_refresh(outcome: &'static str) {
    counter!("gateway_background_refresh_total", "outcome" => outcome).increment(1);
}
