//! End-to-end tests for the control service over its HTTP transport.
//!
//! Each test binds a host on an ephemeral loopback port and talks to it with
//! plain HTTP/1.1 over a TCP stream.

use function_instance_control::{
    ControlService, FunctionStatus, HostOptions, HostState, MetricsData, MetricsRegistry,
    ServiceHost,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), function_instance_control::ControlError>>,
}

async fn start(registry: Arc<MetricsRegistry>, options: HostOptions) -> Running {
    let service = ControlService::new(registry, options.instance_id.clone());
    let host = ServiceHost::new(service, options).unwrap();
    let bound = host.bind().await.unwrap();
    let addr = bound.local_addr();

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(bound.serve(async move {
        let _ = stopped.await;
    }));

    Running { addr, stop, task }
}

fn loopback_options() -> HostOptions {
    HostOptions {
        addr: "127.0.0.1:0".parse().unwrap(),
        instance_id: "7".to_string(),
        ..HostOptions::default()
    }
}

/// Sends one request and returns (status code, body).
async fn request(addr: SocketAddr, method: &str, path: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let raw = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{{}}"
    );
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("response without header terminator");
    let code = head
        .split_whitespace()
        .nth(1)
        .and_then(|c| c.parse().ok())
        .expect("malformed status line");
    (code, body.to_string())
}

#[tokio::test]
async fn test_fresh_instance_status() {
    let running = start(Arc::new(MetricsRegistry::new()), loopback_options()).await;

    let (code, body) = request(running.addr, "POST", "/InstanceControl/GetFunctionStatus").await;
    assert_eq!(code, 200);

    let status: FunctionStatus = serde_json::from_str(&body).unwrap();
    assert!(status.running);
    assert!(status.failure_cause.is_none());
    assert_eq!(status.num_received, 0);
    assert_eq!(status.num_successfully_processed, 0);
    assert_eq!(status.num_user_exceptions, 0);
    assert_eq!(status.num_system_exceptions, 0);
    assert!(status.last_invocation_time.is_none());
    assert_eq!(status.instance_id, "7");
    assert!(!body.contains("failureCause"));

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_scrape_resets_window_but_not_status() {
    let registry = Arc::new(MetricsRegistry::new());
    let running = start(registry.clone(), loopback_options()).await;

    for _ in 0..5 {
        registry.record_received();
        registry.record_success(Duration::from_millis(3));
    }
    registry.increment("rows_written", 40);

    let (code, body) = request(running.addr, "POST", "/InstanceControl/GetAndResetMetrics").await;
    assert_eq!(code, 200);
    let scrape: MetricsData = serde_json::from_str(&body).unwrap();
    assert_eq!(scrape.value("__total_received__"), 5.0);
    assert_eq!(scrape.value("__total_successfully_processed__"), 5.0);
    assert_eq!(scrape.value("__latency_count__"), 5.0);
    assert_eq!(scrape.value("rows_written"), 40.0);

    let (_, body) = request(running.addr, "POST", "/InstanceControl/GetAndResetMetrics").await;
    let second: MetricsData = serde_json::from_str(&body).unwrap();
    assert!(second.is_all_zero());

    let (_, body) = request(running.addr, "POST", "/InstanceControl/GetFunctionStatus").await;
    let status: FunctionStatus = serde_json::from_str(&body).unwrap();
    assert_eq!(status.num_received, 5);
    assert!(status.last_invocation_time.is_some());

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_get_metrics_and_reset_metrics() {
    let registry = Arc::new(MetricsRegistry::new());
    let running = start(registry.clone(), loopback_options()).await;

    registry.record_received();

    let (_, body) = request(running.addr, "POST", "/InstanceControl/GetMetrics").await;
    let peek: MetricsData = serde_json::from_str(&body).unwrap();
    assert_eq!(peek.value("__total_received__"), 1.0);

    let (code, body) = request(running.addr, "POST", "/InstanceControl/ResetMetrics").await;
    assert_eq!(code, 200);
    assert_eq!(body.trim(), "{}");

    let (_, body) = request(running.addr, "POST", "/InstanceControl/GetMetrics").await;
    let after: MetricsData = serde_json::from_str(&body).unwrap();
    assert!(after.is_all_zero());

    let (code, body) = request(running.addr, "POST", "/InstanceControl/HealthCheck").await;
    assert_eq!(code, 200);
    assert!(body.contains("\"success\":true"));

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_prometheus_endpoint_reports_lifetime_totals() {
    let registry = Arc::new(MetricsRegistry::new());
    let running = start(registry.clone(), loopback_options()).await;

    registry.record_received();
    registry.record_received();
    registry.record_system_exception("lost connection");

    // A scrape of the window must not affect /metrics
    request(running.addr, "POST", "/InstanceControl/GetAndResetMetrics").await;

    let (code, body) = request(running.addr, "GET", "/metrics").await;
    assert_eq!(code, 200);
    assert!(body.contains("function_received_total{instance_id=\"7\"} 2"));
    assert!(body.contains("function_system_exceptions_total{instance_id=\"7\"} 1"));

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_prometheus_endpoint_can_be_disabled() {
    let options = HostOptions {
        enable_prometheus: false,
        ..loopback_options()
    };
    let running = start(Arc::new(MetricsRegistry::new()), options).await;

    let (code, _) = request(running.addr, "GET", "/metrics").await;
    assert_eq!(code, 404);

    let (code, body) = request(running.addr, "GET", "/").await;
    assert_eq!(code, 200);
    assert!(body.contains("/InstanceControl/GetFunctionStatus"));

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_single_slot_pool_still_serves_every_call() {
    let options = HostOptions {
        max_concurrent_calls: 1,
        ..loopback_options()
    };
    let registry = Arc::new(MetricsRegistry::new());
    let running = start(registry.clone(), options).await;

    let calls: Vec<_> = (0..8)
        .map(|_| {
            let addr = running.addr;
            tokio::spawn(async move {
                request(addr, "POST", "/InstanceControl/GetFunctionStatus").await
            })
        })
        .collect();

    for call in calls {
        let (code, _) = call.await.unwrap();
        assert_eq!(code, 200);
    }

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_lifecycle_is_observable() {
    let service = ControlService::new(Arc::new(MetricsRegistry::new()), "0");
    let host = ServiceHost::new(service, loopback_options()).unwrap();
    let mut states = host.subscribe();
    assert_eq!(*states.borrow(), HostState::Created);

    let bound = host.bind().await.unwrap();
    assert_eq!(*states.borrow_and_update(), HostState::Bound);

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(bound.serve(async move {
        let _ = stopped.await;
    }));

    states.changed().await.unwrap();
    assert_eq!(*states.borrow_and_update(), HostState::Serving);

    stop.send(()).unwrap();
    task.await.unwrap().unwrap();
    assert_eq!(*states.borrow(), HostState::Stopped);
}
