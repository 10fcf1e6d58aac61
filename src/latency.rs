//! Latency summary accumulator.
//!
//! Folds per-invocation durations into count, sum, min and max plus a fixed
//! set of buckets. The accumulator is plain data; the registry keeps it
//! behind a mutex so readers never observe a count from one sample and a sum
//! from another.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bounds of the latency buckets, in milliseconds.
pub const BUCKET_BOUNDS_MS: [f64; 10] = [
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 5_000.0,
];

/// Running latency statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyAccumulator {
    count: u64,
    sum_ms: f64,
    min_ms: f64,
    max_ms: f64,
    // Non-cumulative; samples above the last bound only show up in `count`.
    buckets: [u64; BUCKET_BOUNDS_MS.len()],
}

impl LatencyAccumulator {
    pub fn add(&mut self, sample: Duration) {
        let value = sample.as_secs_f64() * 1000.0;
        if self.count == 0 {
            self.min_ms = value;
            self.max_ms = value;
        } else {
            self.min_ms = self.min_ms.min(value);
            self.max_ms = self.max_ms.max(value);
        }
        self.count += 1;
        self.sum_ms += value;

        if let Some(slot) = BUCKET_BOUNDS_MS.iter().position(|&le| value <= le) {
            self.buckets[slot] += 1;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum_ms(&self) -> f64 {
        self.sum_ms
    }

    pub fn min_ms(&self) -> f64 {
        self.min_ms
    }

    pub fn max_ms(&self) -> f64 {
        self.max_ms
    }

    pub fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_ms / (self.count as f64)
        }
    }

    /// Wire form with cumulative bucket counts.
    pub fn summary(&self) -> LatencySummary {
        let mut running = 0;
        let buckets = BUCKET_BOUNDS_MS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&le_ms, &n)| {
                running += n;
                LatencyBucket {
                    le_ms,
                    count: running,
                }
            })
            .collect();

        LatencySummary {
            count: self.count,
            sum_ms: self.sum_ms,
            min_ms: self.min_ms,
            max_ms: self.max_ms,
            buckets,
        }
    }
}

/// Serializable latency summary reported in `FunctionStatus`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LatencySummary {
    pub count: u64,
    pub sum_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Cumulative counts; the implicit `+Inf` bucket equals `count`.
    pub buckets: Vec<LatencyBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LatencyBucket {
    pub le_ms: f64,
    pub count: u64,
}
