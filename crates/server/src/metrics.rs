//! Observability Metrics
//!
//! Prometheus exporter for the `metrics` facade used throughout the relay.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use crate::state::AppState;
use crate::ServerError;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Idempotent.
pub fn init_metrics() -> Result<PrometheusHandle, ServerError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Internal(format!("Failed to install Prometheus recorder: {}", e)))?;

    voice_bridge_relay::register_relay_metrics();
    counter!("voice_bridge_requests_total", "endpoint" => "voice").absolute(0);
    counter!("voice_bridge_requests_total", "endpoint" => "make_call").absolute(0);
    counter!("voice_bridge_requests_total", "endpoint" => "media_stream").absolute(0);

    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

pub fn record_request(endpoint: &'static str) {
    counter!("voice_bridge_requests_total", "endpoint" => endpoint).increment(1);
}

pub fn record_error(error_type: &'static str) {
    counter!("voice_bridge_errors_total", "type" => error_type).increment(1);
}

/// Prometheus text endpoint
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    metrics::gauge!("voice_bridge_calls_active").set(state.sessions.count() as f64);

    match get_metrics_handle() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        ),
    }
}
