//! Metrics collection and export for Courier.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const DELIVERIES_TOTAL: &str = "courier_deliveries_total";
    pub const DELIVERY_SECONDS: &str = "courier_delivery_seconds";
    pub const ERRORS_TOTAL: &str = "courier_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    // Describe metrics
    metrics::describe_counter!(
        names::DELIVERIES_TOTAL,
        "Total number of webhook deliveries, labeled by response status"
    );
    metrics::describe_histogram!(
        names::DELIVERY_SECONDS,
        "Delivery handling latency in seconds"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of dispatch errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a handled delivery.
pub fn record_delivery(status: u16) {
    counter!(names::DELIVERIES_TOTAL, "status" => status.to_string()).increment(1);
}

/// Record delivery handling latency.
pub fn record_latency(seconds: f64) {
    histogram!(names::DELIVERY_SECONDS).record(seconds);
}

/// Record a dispatch error.
pub fn record_error(error_type: &str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type.to_string()).increment(1);
}
