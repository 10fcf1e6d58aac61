//! Root endpoint handler listing the available calls.

use axum::{extract::State, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::service::{
    GET_AND_RESET_METRICS_PATH, GET_FUNCTION_STATUS_PATH, GET_METRICS_PATH, HEALTH_CHECK_PATH,
    RESET_METRICS_PATH,
};
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;

    let mut out = String::new();
    writeln!(out, "function-instance-control {}", env!("CARGO_PKG_VERSION")).ok();
    writeln!(out, "Uptime: {}h {}m {}s", hours, minutes, seconds).ok();
    writeln!(out, "Max concurrent calls: {}", state.max_concurrent_calls).ok();
    writeln!(out).ok();
    writeln!(out, "RPC (POST, JSON):").ok();
    for path in [
        GET_FUNCTION_STATUS_PATH,
        GET_AND_RESET_METRICS_PATH,
        GET_METRICS_PATH,
        RESET_METRICS_PATH,
        HEALTH_CHECK_PATH,
    ] {
        writeln!(out, "  {path}").ok();
    }
    if state.exporter.is_some() {
        writeln!(out).ok();
        writeln!(out, "Prometheus (GET): /metrics").ok();
    }

    ([("Content-Type", "text/plain; charset=utf-8")], out)
}
