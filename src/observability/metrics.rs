//! Metrics collection and exposition.
//!
//! # Metrics
//! - `webhook_reviews_total` (counter): reviews by kind, outcome
//! - `webhook_review_duration_seconds` (histogram): review latency by kind
//! - `webhook_reloads_total` (counter): reload attempts by file, result
//!
//! Without an installed exporter every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::provider::ProviderKind;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a finished review.
pub fn record_review(kind: &'static str, outcome: &'static str, start: Instant) {
    metrics::counter!("webhook_reviews_total", "kind" => kind, "outcome" => outcome).increment(1);
    metrics::histogram!("webhook_review_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

/// Record a reload attempt.
pub fn record_reload(kind: ProviderKind, result: &'static str) {
    metrics::counter!("webhook_reloads_total", "file" => kind.as_str(), "result" => result).increment(1);
}
