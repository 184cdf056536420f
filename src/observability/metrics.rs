//! Metrics collection and exposition.
//!
//! # Metrics
//! - `config_requests_total` (counter): requests by operation and status
//! - `config_request_duration_seconds` (histogram): engine processing time
//! - `config_namespace_version` (gauge): current version per namespace
//! - `config_decode_failures_total` (counter): undecodable frames by kind
//! - `config_client_retries_total` (counter): client-side retries by operation

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::codec::ErrorKind;
use crate::schema::Namespace;
use crate::store::ConfigVersion;

/// Install the Prometheus recorder with an HTTP scrape endpoint.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(op: &'static str, status: &'static str, start: Instant) {
    counter!("config_requests_total", "op" => op, "status" => status).increment(1);
    histogram!("config_request_duration_seconds", "op" => op)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_namespace_version(namespace: &Namespace, version: ConfigVersion) {
    gauge!("config_namespace_version", "namespace" => namespace.to_string())
        .set(version.get() as f64);
}

pub fn record_decode_failure(kind: ErrorKind) {
    counter!("config_decode_failures_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_client_retry(op: &'static str) {
    counter!("config_client_retries_total", "op" => op).increment(1);
}
