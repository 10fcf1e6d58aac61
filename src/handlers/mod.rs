//! HTTP endpoint handlers for the control service.
//!
//! - `/InstanceControl/*`: unary RPC calls with JSON responses
//! - `/metrics`: Prometheus text rendering of lifetime counters
//! - `/`: plain-text index

pub mod metrics;
pub mod root;
pub mod rpc;

// Re-export handlers
pub use metrics::metrics_handler;
pub use root::root_handler;
pub use rpc::{
    get_and_reset_metrics_handler, get_function_status_handler, get_metrics_handler,
    health_check_handler, reset_metrics_handler,
};
