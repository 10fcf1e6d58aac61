//! Prometheus endpoint handler.
//!
//! Renders lifetime counters; unlike `GetAndResetMetrics` it never clears
//! anything, so any number of Prometheus servers can scrape it.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::error::ControlError;
use crate::state::SharedState;

impl IntoResponse for ControlError {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, ControlError> {
    let start = Instant::now();
    let Some(exporter) = state.exporter.as_ref() else {
        return Err(ControlError::InvalidConfig(
            "Prometheus endpoint is disabled".to_string(),
        ));
    };

    let body = exporter.render(|| state.service.status_snapshot()).map_err(|e| {
        error!("Failed to encode Prometheus metrics: {}", e);
        e
    })?;

    debug!(
        "Metrics request completed: {} bytes, {:.3}ms",
        body.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(body)
}
