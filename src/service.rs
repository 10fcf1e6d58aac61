//! The RPC-facing control service.
//!
//! `ControlService` is transport-agnostic: each method takes the (empty)
//! request message and returns the response message. The HTTP binding lives
//! in `handlers`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::registry::MetricsRegistry;
use crate::reset::{MetricsData, MetricsResetOp};
use crate::status::{FunctionStatus, StatusSnapshotBuilder};

/// Method paths, following the `/<Service>/<Method>` convention.
pub const GET_FUNCTION_STATUS_PATH: &str = "/InstanceControl/GetFunctionStatus";
pub const GET_AND_RESET_METRICS_PATH: &str = "/InstanceControl/GetAndResetMetrics";
pub const GET_METRICS_PATH: &str = "/InstanceControl/GetMetrics";
pub const RESET_METRICS_PATH: &str = "/InstanceControl/ResetMetrics";
pub const HEALTH_CHECK_PATH: &str = "/InstanceControl/HealthCheck";

/// Request and response message without fields.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Empty {}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthCheckResult {
    pub success: bool,
}

/// Status and metrics operations for one function instance.
#[derive(Clone)]
pub struct ControlService {
    status: StatusSnapshotBuilder,
    metrics: MetricsResetOp,
}

impl ControlService {
    pub fn new(registry: Arc<MetricsRegistry>, instance_id: impl Into<String>) -> Self {
        Self {
            status: StatusSnapshotBuilder::new(registry.clone(), instance_id),
            metrics: MetricsResetOp::new(registry),
        }
    }

    pub fn get_function_status(&self, _request: Empty) -> FunctionStatus {
        info!("GetFunctionStatus called");
        self.status.build()
    }

    pub fn get_and_reset_metrics(&self, _request: Empty) -> MetricsData {
        info!("GetAndResetMetrics called");
        self.metrics.execute()
    }

    pub fn get_metrics(&self, _request: Empty) -> MetricsData {
        info!("GetMetrics called");
        self.metrics.peek()
    }

    pub fn reset_metrics(&self, _request: Empty) -> Empty {
        info!("ResetMetrics called");
        self.metrics.discard();
        Empty {}
    }

    /// Status snapshot for the Prometheus surface, without the RPC log line.
    pub fn status_snapshot(&self) -> FunctionStatus {
        self.status.build()
    }

    /// Answers as long as the instance is alive.
    pub fn health_check(&self, _request: Empty) -> HealthCheckResult {
        HealthCheckResult { success: true }
    }
}
