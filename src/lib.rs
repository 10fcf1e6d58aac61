//! Function Instance Control Library
//!
//! This library provides the control-plane endpoint embedded in a
//! function-execution worker. It exposes the live status of the instance and
//! its accumulated invocation metrics, with read-and-clear scraping that
//! never loses or double-counts an increment made concurrently by the
//! execution path.
//!
//! # Features
//!
//! - **Metrics Registry**: Lifetime totals plus a scrape window, fed by
//!   increment-only operations from any number of threads
//! - **Atomic Get-and-Reset**: Capture and clear under one barrier
//! - **Non-blocking Status**: Status snapshots never wait on a scrape
//! - **Bounded Call Pool**: A fixed number of control calls in flight;
//!   extra calls queue
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use function_instance_control::{ControlService, Empty, MetricsRegistry};
//!
//! // One registry per instance, shared by the execution path and the service
//! let registry = Arc::new(MetricsRegistry::new());
//! let service = ControlService::new(registry.clone(), "0");
//!
//! // Execution path
//! registry.record_received();
//! registry.record_success(Duration::from_millis(12));
//!
//! // Control path
//! let status = service.get_function_status(Empty::default());
//! assert_eq!(status.num_received, 1);
//!
//! let scrape = service.get_and_reset_metrics(Empty::default());
//! assert_eq!(scrape.value("__total_received__"), 1.0);
//! assert!(service.get_and_reset_metrics(Empty::default()).is_all_zero());
//! ```

pub mod error;
pub mod handlers;
pub mod host;
pub mod latency;
pub mod prom;
pub mod registry;
pub mod reset;
pub mod service;
pub mod state;
pub mod status;

// Re-export main types for convenience
pub use error::ControlError;
pub use host::{BoundHost, HostOptions, HostState, ServiceHost};
pub use registry::{Counter, ExceptionInformation, MetricsRegistry, StatusField};
pub use reset::{MetricsData, MetricsResetOp};
pub use service::{ControlService, Empty, HealthCheckResult};
pub use status::{FunctionStatus, StatusSnapshotBuilder};
