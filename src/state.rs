//! Application state shared by the HTTP handlers.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use crate::prom::PrometheusExporter;
use crate::service::ControlService;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// State handed to every request handler.
pub struct AppState {
    pub service: ControlService,
    /// Present when the `/metrics` endpoint is enabled.
    pub exporter: Option<PrometheusExporter>,
    /// Bounds the number of calls handled at once; extra calls queue.
    pub call_slots: Semaphore,
    pub max_concurrent_calls: usize,
    /// Host start time for uptime calculation.
    pub start_time: Instant,
}
