//! Prometheus rendering of lifetime counters.
//!
//! The `/metrics` surface is read-only: it renders the same lifetime values
//! as `GetFunctionStatus` and never touches the scrape window.

use prometheus::{Counter, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::sync::Mutex;

use crate::error::ControlError;
use crate::status::FunctionStatus;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 16 * 1024;

/// Prometheus collectors for one function instance.
pub struct PrometheusExporter {
    registry: Registry,
    received_total: Counter,
    successfully_processed_total: Counter,
    user_exceptions_total: Counter,
    system_exceptions_total: Counter,
    latency_count: Counter,
    latency_sum_ms: Counter,
    latency_bucket: GaugeVec, // labels: le
    latency_avg_ms: Gauge,
    running: Gauge,
    last_invocation_seconds: Gauge,
    // Two scrapes must not interleave their reset/inc_by pairs.
    render_lock: Mutex<()>,
}

impl PrometheusExporter {
    pub fn new(instance_id: &str) -> Result<Self, ControlError> {
        let opts = |name: &str, help: &str| {
            Opts::new(name, help).const_label("instance_id", instance_id)
        };

        let received_total = Counter::with_opts(opts(
            "function_received_total",
            "Units of work received by the function instance",
        ))?;
        let successfully_processed_total = Counter::with_opts(opts(
            "function_successfully_processed_total",
            "Units of work processed without an exception",
        ))?;
        let user_exceptions_total = Counter::with_opts(opts(
            "function_user_exceptions_total",
            "Exceptions raised by the user function",
        ))?;
        let system_exceptions_total = Counter::with_opts(opts(
            "function_system_exceptions_total",
            "Failures of the runtime while handling a unit of work",
        ))?;
        let latency_count = Counter::with_opts(opts(
            "function_process_latency_ms_count",
            "Number of latency samples",
        ))?;
        let latency_sum_ms = Counter::with_opts(opts(
            "function_process_latency_ms_sum",
            "Sum of processing latency in milliseconds",
        ))?;
        let latency_bucket = GaugeVec::new(
            opts(
                "function_process_latency_ms_bucket",
                "Cumulative latency samples at or below the bucket bound (ms)",
            ),
            &["le"],
        )?;
        let latency_avg_ms = Gauge::with_opts(opts(
            "function_process_latency_ms_avg",
            "Mean processing latency in milliseconds",
        ))?;
        let running = Gauge::with_opts(opts(
            "function_running",
            "Whether the function instance is running (1) or not (0)",
        ))?;
        let last_invocation_seconds = Gauge::with_opts(opts(
            "function_last_invocation_timestamp_seconds",
            "Unix time of the last received unit of work",
        ))?;

        let registry = Registry::new();
        registry.register(Box::new(received_total.clone()))?;
        registry.register(Box::new(successfully_processed_total.clone()))?;
        registry.register(Box::new(user_exceptions_total.clone()))?;
        registry.register(Box::new(system_exceptions_total.clone()))?;
        registry.register(Box::new(latency_count.clone()))?;
        registry.register(Box::new(latency_sum_ms.clone()))?;
        registry.register(Box::new(latency_bucket.clone()))?;
        registry.register(Box::new(latency_avg_ms.clone()))?;
        registry.register(Box::new(running.clone()))?;
        registry.register(Box::new(last_invocation_seconds.clone()))?;

        Ok(Self {
            registry,
            received_total,
            successfully_processed_total,
            user_exceptions_total,
            system_exceptions_total,
            latency_count,
            latency_sum_ms,
            latency_bucket,
            latency_avg_ms,
            running,
            last_invocation_seconds,
            render_lock: Mutex::new(()),
        })
    }

    /// Renders the status returned by `snapshot` in the Prometheus text
    /// exposition format.
    ///
    /// `snapshot` runs under the render lock, so concurrent renders publish
    /// snapshots in the order they were taken.
    pub fn render<F>(&self, snapshot: F) -> Result<String, ControlError>
    where
        F: FnOnce() -> FunctionStatus,
    {
        let _guard = self
            .render_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let status = snapshot();

        // Counters only go up, so absolute values are set with reset + inc_by.
        set_counter(&self.received_total, status.num_received as f64);
        set_counter(
            &self.successfully_processed_total,
            status.num_successfully_processed as f64,
        );
        set_counter(&self.user_exceptions_total, status.num_user_exceptions as f64);
        set_counter(
            &self.system_exceptions_total,
            status.num_system_exceptions as f64,
        );
        set_counter(&self.latency_count, status.latency_stats.count as f64);
        set_counter(&self.latency_sum_ms, status.latency_stats.sum_ms);

        for bucket in &status.latency_stats.buckets {
            let le = bucket.le_ms.to_string();
            self.latency_bucket
                .with_label_values(&[le.as_str()])
                .set(bucket.count as f64);
        }
        self.latency_bucket
            .with_label_values(&["+Inf"])
            .set(status.latency_stats.count as f64);

        self.latency_avg_ms.set(status.average_latency);
        self.running.set(if status.running { 1.0 } else { 0.0 });
        self.last_invocation_seconds.set(
            status
                .last_invocation_time
                .map(|ms| ms as f64 / 1000.0)
                .unwrap_or(0.0),
        );

        let families = self.registry.gather();
        let mut buffer = Vec::with_capacity(BUFFER_CAP);
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| ControlError::Encode(prometheus::Error::Msg(e.to_string())))
    }
}

fn set_counter(counter: &Counter, value: f64) {
    counter.reset();
    counter.inc_by(value);
}
