//! HTTP handlers: the Prometheus scrape endpoint and a small landing page.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    let families = state.registry.gather();
    let mut buffer = Vec::with_capacity(16 * 1024);
    let encoder = TextEncoder::new();
    if let Err(err) = encoder.encode(&families, &mut buffer) {
        error!(error = %err, "Failed to encode metrics");
        return Err(MetricsError::EncodingFailed);
    }

    state
        .metrics
        .scrape_duration
        .set(start.elapsed().as_secs_f64());

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");
    let uptime_secs = state.start_time.elapsed().as_secs();
    let uptime = format!(
        "{}h {}m {}s",
        uptime_secs / 3600,
        (uptime_secs % 3600) / 60,
        uptime_secs % 60
    );

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>gstat Exporter</title>
</head>
<body>
    <h1>gstat Exporter</h1>
    <p>Prometheus exporter for FreeBSD GEOM per-device I/O statistics.</p>
    <p>Version {version}, uptime {uptime}</p>
    <p><a href="/metrics">/metrics</a></p>
</body>
</html>"#
    ))
}
