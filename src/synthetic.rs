//! Synthetic execution path.
//!
//! Drives the registry the way a real worker would: every invocation is
//! received first, then ends as a success, a user exception or a system
//! exception. Used for demos and soak runs of the control service.

use function_instance_control::MetricsRegistry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const USER_EXCEPTION_RATE: f64 = 0.05;
const SYSTEM_EXCEPTION_RATE: f64 = 0.01;

/// Custom counter bumped for every simulated invocation.
pub const PAYLOAD_BYTES_COUNTER: &str = "payload_bytes";

/// How a simulated invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    UserException,
    SystemException,
}

/// Runs one invocation against `registry`.
pub fn simulate_invocation<R: Rng>(registry: &MetricsRegistry, rng: &mut R) -> Outcome {
    registry.record_received();
    registry.increment(PAYLOAD_BYTES_COUNTER, rng.gen_range(64..4096));

    let roll: f64 = rng.gen();
    if roll < SYSTEM_EXCEPTION_RATE {
        registry.record_system_exception("synthetic: runtime failed to deliver result");
        Outcome::SystemException
    } else if roll < SYSTEM_EXCEPTION_RATE + USER_EXCEPTION_RATE {
        registry.record_user_exception("synthetic: user function raised");
        Outcome::UserException
    } else {
        let latency = Duration::from_micros(rng.gen_range(200..250_000));
        registry.record_success(latency);
        Outcome::Success
    }
}

/// Spawns a task issuing `per_second` invocations per second.
pub fn spawn(registry: Arc<MetricsRegistry>, per_second: u32) -> JoinHandle<()> {
    let period = Duration::from_secs(1) / per_second.max(1);
    info!(
        "Synthetic load enabled: {} invocations/s ({:?} period)",
        per_second, period
    );

    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let outcome = simulate_invocation(&registry, &mut rng);
            debug!("Synthetic invocation finished: {:?}", outcome);
        }
    })
}
