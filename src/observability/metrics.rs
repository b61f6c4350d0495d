//! Metrics collection and exposition.
//!
//! # Metrics
//! - `clickgate_admission_total` (counter): admission decisions by outcome
//! - `clickgate_redirects_total` (counter): served redirects by product
//! - `clickgate_postbacks_total` (counter): dispatch outcomes by network
//! - `clickgate_breaker_transitions_total` (counter): breaker state changes
//!
//! # Design Decisions
//! - Counters only; latency histograms belong to the HTTP trace layer
//! - Labels are low-cardinality (reason, network, state name)

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on the given address.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter started"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

/// Record an admission decision. `outcome` is `allow`, `bypass`, or a deny reason.
pub fn record_admission(outcome: &str) {
    metrics::counter!("clickgate_admission_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a served redirect.
pub fn record_redirect(product: &str) {
    metrics::counter!("clickgate_redirects_total", "product" => product.to_string()).increment(1);
}

/// Record a postback dispatch outcome. `outcome` is `ok`, `error`, or `breaker_open`.
pub fn record_postback(network: &str, outcome: &str) {
    metrics::counter!(
        "clickgate_postbacks_total",
        "network" => network.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a circuit breaker state transition.
pub fn record_breaker_transition(name: &str, state: &str) {
    metrics::counter!(
        "clickgate_breaker_transitions_total",
        "breaker" => name.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
}
