//! Unary RPC handlers for the `InstanceControl` service.
//!
//! Request bodies are ignored: every request message is empty.

use axum::{extract::State, Json};
use tracing::{debug, instrument};

use crate::reset::MetricsData;
use crate::service::{Empty, HealthCheckResult};
use crate::state::SharedState;
use crate::status::FunctionStatus;

#[instrument(skip(state))]
pub async fn get_function_status_handler(State(state): State<SharedState>) -> Json<FunctionStatus> {
    Json(state.service.get_function_status(Empty::default()))
}

#[instrument(skip(state))]
pub async fn get_and_reset_metrics_handler(State(state): State<SharedState>) -> Json<MetricsData> {
    let data = state.service.get_and_reset_metrics(Empty::default());
    debug!("Scrape returned {} metrics", data.metrics.len());
    Json(data)
}

#[instrument(skip(state))]
pub async fn get_metrics_handler(State(state): State<SharedState>) -> Json<MetricsData> {
    Json(state.service.get_metrics(Empty::default()))
}

#[instrument(skip(state))]
pub async fn reset_metrics_handler(State(state): State<SharedState>) -> Json<Empty> {
    Json(state.service.reset_metrics(Empty::default()))
}

#[instrument(skip(state))]
pub async fn health_check_handler(State(state): State<SharedState>) -> Json<HealthCheckResult> {
    Json(state.service.health_check(Empty::default()))
}
