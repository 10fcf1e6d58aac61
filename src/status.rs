//! Point-in-time status reporting.
//!
//! `StatusSnapshotBuilder` copies lifetime values out of the registry. It
//! never takes the reset barrier, so a status call does not wait for a scrape
//! in progress. Each field is read atomically on its own; fields may reflect
//! slightly different instants.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::latency::LatencySummary;
use crate::registry::{ExceptionInformation, MetricsRegistry};

/// Operational state of the function instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionStatus {
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_cause: Option<String>,
    pub num_received: u64,
    pub num_successfully_processed: u64,
    pub num_user_exceptions: u64,
    pub latest_user_exceptions: Vec<ExceptionInformation>,
    pub num_system_exceptions: u64,
    pub latest_system_exceptions: Vec<ExceptionInformation>,
    /// Mean latency in milliseconds, 0 when nothing was measured.
    pub average_latency: f64,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_invocation_time: Option<i64>,
    pub latency_stats: LatencySummary,
    pub instance_id: String,
}

/// Builds `FunctionStatus` values from a shared registry.
#[derive(Clone)]
pub struct StatusSnapshotBuilder {
    registry: Arc<MetricsRegistry>,
    instance_id: Arc<str>,
}

impl StatusSnapshotBuilder {
    pub fn new(registry: Arc<MetricsRegistry>, instance_id: impl Into<String>) -> Self {
        let instance_id: String = instance_id.into();
        Self {
            registry,
            instance_id: Arc::from(instance_id),
        }
    }

    pub fn build(&self) -> FunctionStatus {
        let [received, successes, user_exceptions, system_exceptions] =
            self.registry.lifetime_totals();
        let latency = self.registry.lifetime_latency();

        FunctionStatus {
            running: self.registry.running(),
            failure_cause: self.registry.failure_cause(),
            num_received: received,
            num_successfully_processed: successes,
            num_user_exceptions: user_exceptions,
            latest_user_exceptions: self.registry.latest_user_exceptions(),
            num_system_exceptions: system_exceptions,
            latest_system_exceptions: self.registry.latest_system_exceptions(),
            average_latency: latency.avg_ms(),
            last_invocation_time: self
                .registry
                .last_invocation_time()
                .map(|t| t.timestamp_millis()),
            latency_stats: latency.summary(),
            instance_id: self.instance_id.to_string(),
        }
    }
}
