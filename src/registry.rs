//! Shared counter and status store for one function instance.
//!
//! The execution path feeds the registry through increment-only operations
//! while the control path reads it. Every counter is kept twice: a lifetime
//! total that is never cleared (reported by `GetFunctionStatus`) and a
//! window value that is cleared on each scrape (reported by
//! `GetAndResetMetrics`).
//!
//! # Reset barrier
//!
//! Writers hold the read side of `barrier` while they touch the window and
//! lifetime values; a snapshot holds the write side. A snapshot therefore
//! sees every increment either completely or not at all, and an increment
//! that starts after the clear lands in the next window. The barrier also
//! guards the drain ledger, which lets each reset verify
//! `lifetime == drained + window` for the built-in counters.

use ahash::RandomState;
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;
use tracing::{error, warn};

use crate::latency::LatencyAccumulator;

/// Number of recent exceptions kept per kind when not configured.
pub const DEFAULT_EXCEPTION_HISTORY: usize = 10;

/// Names starting with this prefix belong to built-in metrics.
pub const RESERVED_PREFIX: &str = "__";

const NEVER: i64 = i64::MIN;
// Initial capacity hint for the exception history buffers.
const HISTORY_PREALLOC: usize = 64;
const CUSTOM_SLACK: usize = 8;
const COUNTERS: usize = 4;

/// Built-in invocation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    Received,
    SuccessfullyProcessed,
    UserExceptions,
    SystemExceptions,
}

impl Counter {
    pub const ALL: [Counter; COUNTERS] = [
        Counter::Received,
        Counter::SuccessfullyProcessed,
        Counter::UserExceptions,
        Counter::SystemExceptions,
    ];

    /// Name used for this counter in `MetricsData`.
    pub fn metric_name(self) -> &'static str {
        match self {
            Counter::Received => "__total_received__",
            Counter::SuccessfullyProcessed => "__total_successfully_processed__",
            Counter::UserExceptions => "__total_user_exceptions__",
            Counter::SystemExceptions => "__total_system_exceptions__",
        }
    }

    pub fn from_metric_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.metric_name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// A scalar status field update. Each field is last-writer-wins.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusField {
    Running(bool),
    FailureCause(Option<String>),
    LastInvocationTime(DateTime<Utc>),
}

/// One entry of the recent-exceptions history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionInformation {
    pub exception_string: String,
    pub ms_since_epoch: i64,
}

/// Counter values captured under the reset barrier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CounterSnapshot {
    counters: [u64; COUNTERS],
    pub latency: LatencyAccumulator,
    /// User-defined counters, in no particular order.
    pub custom: Vec<(Arc<str>, u64)>,
}

impl CounterSnapshot {
    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()]
    }

    pub fn custom(&self, name: &str) -> Option<u64> {
        self.custom
            .iter()
            .find(|(key, _)| &**key == name)
            .map(|(_, value)| *value)
    }
}

/// Values accumulated since the last reset.
#[derive(Default)]
struct Window {
    counters: [AtomicU64; COUNTERS],
    latency: Mutex<LatencyAccumulator>,
    custom: DashMap<Arc<str>, AtomicU64, RandomState>,
}

/// Totals already handed out by resets.
#[derive(Default)]
struct DrainLedger {
    drained: [u64; COUNTERS],
}

/// Thread-safe registry of invocation counters and status fields.
pub struct MetricsRegistry {
    barrier: RwLock<DrainLedger>,
    window: Window,
    lifetime: [AtomicU64; COUNTERS],
    lifetime_latency: Mutex<LatencyAccumulator>,
    running: AtomicBool,
    failure_cause: RwLock<Option<String>>,
    last_invocation_ms: AtomicI64,
    latest_user_exceptions: Mutex<VecDeque<ExceptionInformation>>,
    latest_system_exceptions: Mutex<VecDeque<ExceptionInformation>>,
    exception_history: usize,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::with_exception_history(DEFAULT_EXCEPTION_HISTORY)
    }
}

impl MetricsRegistry {
    /// Creates an empty registry for a running instance.
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_exception_history(exception_history: usize) -> Self {
        Self {
            barrier: RwLock::new(DrainLedger::default()),
            window: Window::default(),
            lifetime: Default::default(),
            lifetime_latency: Mutex::new(LatencyAccumulator::default()),
            running: AtomicBool::new(true),
            failure_cause: RwLock::new(None),
            last_invocation_ms: AtomicI64::new(NEVER),
            latest_user_exceptions: Mutex::new(VecDeque::with_capacity(
                exception_history.min(HISTORY_PREALLOC),
            )),
            latest_system_exceptions: Mutex::new(VecDeque::with_capacity(
                exception_history.min(HISTORY_PREALLOC),
            )),
            exception_history: exception_history.max(1),
        }
    }

    /// Adds `delta` to the counter called `name`.
    ///
    /// Built-in counter names route to the built-in counters; any other name
    /// outside the reserved `__` namespace becomes a user-defined counter.
    pub fn increment(&self, name: &str, delta: u64) {
        match Counter::from_metric_name(name) {
            Some(counter) => self.increment_counter(counter, delta),
            None if name.starts_with(RESERVED_PREFIX) => {
                warn!("Ignoring increment of reserved metric name '{}'", name);
            }
            None => self.increment_custom(name, delta),
        }
    }

    pub fn increment_counter(&self, counter: Counter, delta: u64) {
        if delta == 0 {
            return;
        }
        let _cut = self.enter();
        let i = counter.index();
        self.window.counters[i].fetch_add(delta, Ordering::Relaxed);
        self.lifetime[i].fetch_add(delta, Ordering::AcqRel);
    }

    fn increment_custom(&self, name: &str, delta: u64) {
        let _cut = self.enter();
        if let Some(slot) = self.window.custom.get(name) {
            slot.fetch_add(delta, Ordering::Relaxed);
            return;
        }
        self.window
            .custom
            .entry(Arc::from(name))
            .or_default()
            .fetch_add(delta, Ordering::Relaxed);
    }

    /// Folds one invocation duration into the latency summaries.
    pub fn record_latency(&self, sample: Duration) {
        let _cut = self.enter();
        lock(&self.window.latency).add(sample);
        lock(&self.lifetime_latency).add(sample);
    }

    pub fn set_status_field(&self, field: StatusField) {
        match field {
            StatusField::Running(running) => self.running.store(running, Ordering::Release),
            StatusField::FailureCause(cause) => {
                *self
                    .failure_cause
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = cause;
            }
            StatusField::LastInvocationTime(at) => self
                .last_invocation_ms
                .store(at.timestamp_millis(), Ordering::Release),
        }
    }

    /// Marks the arrival of one unit of work.
    pub fn record_received(&self) {
        self.increment_counter(Counter::Received, 1);
        self.set_status_field(StatusField::LastInvocationTime(Utc::now()));
    }

    pub fn record_success(&self, latency: Duration) {
        self.increment_counter(Counter::SuccessfullyProcessed, 1);
        self.record_latency(latency);
    }

    /// Records an exception raised by the user function.
    pub fn record_user_exception(&self, exception: impl Into<String>) {
        self.increment_counter(Counter::UserExceptions, 1);
        self.remember(&self.latest_user_exceptions, exception.into());
    }

    /// Records a failure of the runtime itself while handling a unit of work.
    pub fn record_system_exception(&self, exception: impl Into<String>) {
        self.increment_counter(Counter::SystemExceptions, 1);
        self.remember(&self.latest_system_exceptions, exception.into());
    }

    fn remember(&self, history: &Mutex<VecDeque<ExceptionInformation>>, text: String) {
        let mut guard = lock(history);
        if guard.len() == self.exception_history {
            guard.pop_front();
        }
        guard.push_back(ExceptionInformation {
            exception_string: text,
            ms_since_epoch: Utc::now().timestamp_millis(),
        });
    }

    /// Returns a consistent copy of the window counters, clearing them in the
    /// same critical section when `reset_after` is true.
    ///
    /// # Panics
    ///
    /// Panics if a built-in counter's lifetime total disagrees with the sum
    /// of everything drained so far plus the current window. That can only
    /// happen if an increment was lost or counted twice.
    pub fn snapshot_and_maybe_reset(&self, reset_after: bool) -> CounterSnapshot {
        // Sized before the barrier; names registered in between only cost a
        // regrow of this vector.
        let mut custom = Vec::with_capacity(self.window.custom.len() + CUSTOM_SLACK);

        let mut ledger = self
            .barrier
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut counters = [0u64; COUNTERS];
        for counter in Counter::ALL {
            let i = counter.index();
            let slot = &self.window.counters[i];
            let window = slot.load(Ordering::Relaxed);

            // Counters wrap like `fetch_add`, so the ledger does too.
            let lifetime = self.lifetime[i].load(Ordering::Acquire);
            let accounted = ledger.drained[i].wrapping_add(window);
            assert_eq!(
                lifetime,
                accounted,
                "metrics registry invariant violated for {}: lifetime {} != drained {} + window {}",
                counter.metric_name(),
                lifetime,
                ledger.drained[i],
                window
            );

            counters[i] = window;
            if reset_after {
                // No writer can run while the barrier is held.
                slot.store(0, Ordering::Relaxed);
                ledger.drained[i] = accounted;
            }
        }

        let latency = {
            let mut guard = lock(&self.window.latency);
            if reset_after {
                std::mem::take(&mut *guard)
            } else {
                *guard
            }
        };

        for entry in self.window.custom.iter() {
            let value = if reset_after {
                entry.value().swap(0, Ordering::Relaxed)
            } else {
                entry.value().load(Ordering::Relaxed)
            };
            custom.push((Arc::clone(entry.key()), value));
        }
        drop(ledger);

        CounterSnapshot {
            counters,
            latency,
            custom,
        }
    }

    /// Lifetime total of a built-in counter. Never blocks on a reset.
    pub fn lifetime(&self, counter: Counter) -> u64 {
        self.lifetime[counter.index()].load(Ordering::Acquire)
    }

    /// Lifetime totals for (received, successes, user exceptions, system
    /// exceptions), checking the processing invariant.
    pub fn lifetime_totals(&self) -> [u64; COUNTERS] {
        // Outcomes are counted after the arrival they belong to, so reading
        // them before `Received` keeps the sum below the received count.
        let successes = self.lifetime(Counter::SuccessfullyProcessed);
        let user = self.lifetime(Counter::UserExceptions);
        let system = self.lifetime(Counter::SystemExceptions);
        let received = self.lifetime(Counter::Received);

        let outcomes = successes.saturating_add(user);
        if outcomes > received {
            error!(
                "Execution path reported {} outcomes for {} received units of work",
                outcomes, received
            );
        }
        [received, successes, user, system]
    }

    pub fn lifetime_latency(&self) -> LatencyAccumulator {
        *lock(&self.lifetime_latency)
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn failure_cause(&self) -> Option<String> {
        self.failure_cause
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_invocation_time(&self) -> Option<DateTime<Utc>> {
        match self.last_invocation_ms.load(Ordering::Acquire) {
            NEVER => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    pub fn latest_user_exceptions(&self) -> Vec<ExceptionInformation> {
        lock(&self.latest_user_exceptions).iter().cloned().collect()
    }

    pub fn latest_system_exceptions(&self) -> Vec<ExceptionInformation> {
        lock(&self.latest_system_exceptions).iter().cloned().collect()
    }

    fn enter(&self) -> RwLockReadGuard<'_, DrainLedger> {
        self.barrier.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
