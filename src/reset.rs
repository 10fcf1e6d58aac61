//! Read-and-clear of the scrape window.
//!
//! `MetricsResetOp::execute` captures and zeroes the window in one critical
//! section of the registry, so every increment lands in exactly one scrape.
//! Building the name/value map happens after the barrier is released.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::registry::{Counter, CounterSnapshot, MetricsRegistry};

pub const LATENCY_COUNT: &str = "__latency_count__";
pub const LATENCY_SUM_MS: &str = "__latency_sum_ms__";
pub const LATENCY_MIN_MS: &str = "__latency_min_ms__";
pub const LATENCY_MAX_MS: &str = "__latency_max_ms__";
pub const AVG_LATENCY_MS: &str = "__avg_latency_ms__";

/// Largest counter value `MetricsData` carries without rounding.
pub const MAX_EXACT_COUNT: u64 = 1 << 53;

/// Named metric values accumulated since the previous reset.
///
/// Values are `f64` on the wire, so counters are exact only up to 2^53
/// (`MAX_EXACT_COUNT`); larger values are rounded to the nearest double.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsData {
    pub metrics: BTreeMap<String, f64>,
}

impl MetricsData {
    pub fn from_snapshot(snapshot: &CounterSnapshot) -> Self {
        let mut metrics = BTreeMap::new();
        for (name, value) in &snapshot.custom {
            metrics.insert(name.to_string(), *value as f64);
        }
        for counter in Counter::ALL {
            metrics.insert(
                counter.metric_name().to_string(),
                snapshot.get(counter) as f64,
            );
        }

        let latency = &snapshot.latency;
        metrics.insert(LATENCY_COUNT.to_string(), latency.count() as f64);
        metrics.insert(LATENCY_SUM_MS.to_string(), latency.sum_ms());
        metrics.insert(LATENCY_MIN_MS.to_string(), latency.min_ms());
        metrics.insert(LATENCY_MAX_MS.to_string(), latency.max_ms());
        metrics.insert(AVG_LATENCY_MS.to_string(), latency.avg_ms());

        Self { metrics }
    }

    /// Value of `name`, or 0 when the metric is not present.
    pub fn value(&self, name: &str) -> f64 {
        self.metrics.get(name).copied().unwrap_or(0.0)
    }

    pub fn counter(&self, counter: Counter) -> f64 {
        self.value(counter.metric_name())
    }

    pub fn is_all_zero(&self) -> bool {
        self.metrics.values().all(|v| *v == 0.0)
    }
}

/// The get-and-reset operation behind the scrape endpoint.
#[derive(Clone)]
pub struct MetricsResetOp {
    registry: Arc<MetricsRegistry>,
}

impl MetricsResetOp {
    pub fn new(registry: Arc<MetricsRegistry>) -> Self {
        Self { registry }
    }

    /// Returns everything accumulated since the previous reset and clears it.
    pub fn execute(&self) -> MetricsData {
        let snapshot = self.registry.snapshot_and_maybe_reset(true);
        MetricsData::from_snapshot(&snapshot)
    }

    /// Same payload as `execute` without clearing.
    pub fn peek(&self) -> MetricsData {
        let snapshot = self.registry.snapshot_and_maybe_reset(false);
        MetricsData::from_snapshot(&snapshot)
    }

    /// Clears the window, dropping its values.
    pub fn discard(&self) {
        self.registry.snapshot_and_maybe_reset(true);
    }
}
