//! Network lifecycle of the control service.
//!
//! ```text
//! Created --bind()--> Bound --serve()--> Serving --shutdown--> Stopped
//! ```
//!
//! `serve` runs until the shutdown future resolves, then lets in-flight
//! calls finish before returning. There is no restart: an accept-loop
//! failure is returned to the caller, which is expected to exit.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::{Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use crate::error::ControlError;
use crate::handlers::{
    get_and_reset_metrics_handler, get_function_status_handler, get_metrics_handler,
    health_check_handler, metrics_handler, reset_metrics_handler, root_handler,
};
use crate::prom::PrometheusExporter;
use crate::service::{
    ControlService, GET_AND_RESET_METRICS_PATH, GET_FUNCTION_STATUS_PATH, GET_METRICS_PATH,
    HEALTH_CHECK_PATH, RESET_METRICS_PATH,
};
use crate::state::{AppState, SharedState};

pub const DEFAULT_PORT: u16 = 9093;
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 10;

/// Lifecycle state of a `ServiceHost`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Created,
    Bound,
    Serving,
    Stopped,
}

/// Transport settings for the host.
#[derive(Debug, Clone)]
pub struct HostOptions {
    pub addr: SocketAddr,
    /// Size of the call pool; calls beyond it wait for a free slot.
    pub max_concurrent_calls: usize,
    pub enable_prometheus: bool,
    /// Used as a const label on the Prometheus surface.
    pub instance_id: String,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv6Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
            enable_prometheus: true,
            instance_id: "0".to_string(),
        }
    }
}

impl HostOptions {
    pub fn validate(&self) -> Result<(), ControlError> {
        if self.max_concurrent_calls == 0 {
            return Err(ControlError::InvalidConfig(
                "max_concurrent_calls must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// A control service that has not been bound yet.
pub struct ServiceHost {
    state: SharedState,
    addr: SocketAddr,
    lifecycle: watch::Sender<HostState>,
}

impl ServiceHost {
    pub fn new(service: ControlService, options: HostOptions) -> Result<Self, ControlError> {
        options.validate()?;

        let exporter = if options.enable_prometheus {
            Some(PrometheusExporter::new(&options.instance_id)?)
        } else {
            None
        };

        let state = Arc::new(AppState {
            service,
            exporter,
            call_slots: Semaphore::new(options.max_concurrent_calls),
            max_concurrent_calls: options.max_concurrent_calls,
            start_time: Instant::now(),
        });
        let (lifecycle, _) = watch::channel(HostState::Created);

        Ok(Self {
            state,
            addr: options.addr,
            lifecycle,
        })
    }

    pub fn state(&self) -> HostState {
        *self.lifecycle.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<HostState> {
        self.lifecycle.subscribe()
    }

    /// Binds the listening socket.
    pub async fn bind(self) -> Result<BoundHost, ControlError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| ControlError::Bind {
                addr: self.addr,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| ControlError::Bind {
            addr: self.addr,
            source,
        })?;

        self.lifecycle.send_replace(HostState::Bound);
        debug!("Control service bound to {}", local_addr);

        Ok(BoundHost {
            listener,
            local_addr,
            state: self.state,
            lifecycle: self.lifecycle,
        })
    }
}

/// A control service with a bound socket, ready to serve.
pub struct BoundHost {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: SharedState,
    lifecycle: watch::Sender<HostState>,
}

impl BoundHost {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> HostState {
        *self.lifecycle.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<HostState> {
        self.lifecycle.subscribe()
    }

    /// Serves calls until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ControlError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state.clone());

        self.lifecycle.send_replace(HostState::Serving);
        info!(
            "Control service listening on http://{} ({} concurrent calls)",
            self.local_addr, self.state.max_concurrent_calls
        );

        let result = axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        self.lifecycle.send_replace(HostState::Stopped);
        match result {
            Ok(()) => {
                info!("Control service stopped");
                Ok(())
            }
            Err(e) => {
                error!("Control service failed: {}", e);
                Err(ControlError::Serve(e))
            }
        }
    }
}

/// Builds the HTTP router for the control service.
pub fn router(state: SharedState) -> Router {
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route(GET_FUNCTION_STATUS_PATH, post(get_function_status_handler))
        .route(GET_AND_RESET_METRICS_PATH, post(get_and_reset_metrics_handler))
        .route(GET_METRICS_PATH, post(get_metrics_handler))
        .route(RESET_METRICS_PATH, post(reset_metrics_handler))
        .route(HEALTH_CHECK_PATH, post(health_check_handler));

    if state.exporter.is_some() {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.route_layer(middleware::from_fn_with_state(
        state.clone(),
        limit_concurrency,
    ))
    .with_state(state)
}

/// Holds a call slot for the duration of the request.
async fn limit_concurrency(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let _permit = match state.call_slots.acquire().await {
        Ok(permit) => permit,
        Err(_) => {
            warn!("Call pool closed, rejecting {}", request.uri());
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MetricsRegistry;

    fn service() -> ControlService {
        ControlService::new(Arc::new(MetricsRegistry::new()), "0")
    }

    #[test]
    fn test_default_options() {
        let options = HostOptions::default();
        assert_eq!(options.addr.port(), DEFAULT_PORT);
        assert!(options.addr.ip().is_unspecified());
        assert_eq!(options.max_concurrent_calls, 10);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_pool_is_rejected() {
        let options = HostOptions {
            max_concurrent_calls: 0,
            ..HostOptions::default()
        };
        assert!(matches!(
            ServiceHost::new(service(), options),
            Err(ControlError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let options = HostOptions {
            addr: "127.0.0.1:0".parse().unwrap(),
            ..HostOptions::default()
        };
        let host = ServiceHost::new(service(), options).unwrap();
        assert_eq!(host.state(), HostState::Created);

        let bound = host.bind().await.unwrap();
        assert_eq!(bound.state(), HostState::Bound);
        assert_ne!(bound.local_addr().port(), 0);

        let mut states = bound.subscribe();
        bound.serve(async {}).await.unwrap();

        assert_eq!(*states.borrow_and_update(), HostState::Stopped);
    }

    async fn post(addr: SocketAddr, path: &str) -> u16 {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let raw = format!(
            "POST {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        );
        stream.write_all(raw.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap()
    }

    #[tokio::test]
    async fn test_calls_queue_while_pool_is_saturated() {
        use std::time::Duration;
        use tokio::time::timeout;

        let options = HostOptions {
            addr: "127.0.0.1:0".parse().unwrap(),
            max_concurrent_calls: 2,
            ..HostOptions::default()
        };
        let host = ServiceHost::new(service(), options).unwrap();
        let state = host.state.clone();
        let bound = host.bind().await.unwrap();
        let addr = bound.local_addr();

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(bound.serve(async move {
            let _ = stopped.await;
        }));

        // Occupy every slot, as long-running calls would
        let held = state.call_slots.acquire_many(2).await.unwrap();

        let mut calls: Vec<_> = (0..5)
            .map(|_| tokio::spawn(post(addr, GET_FUNCTION_STATUS_PATH)))
            .collect();

        for call in calls.iter_mut() {
            assert!(
                timeout(Duration::from_millis(200), call).await.is_err(),
                "call ran while the pool was full"
            );
        }
        assert_eq!(state.call_slots.available_permits(), 0);

        drop(held);
        for call in calls {
            let code = timeout(Duration::from_secs(5), call)
                .await
                .expect("queued call never ran")
                .unwrap();
            assert_eq!(code, 200);
        }
        assert_eq!(state.call_slots.available_permits(), 2);

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let options = HostOptions {
            addr: taken.local_addr().unwrap(),
            ..HostOptions::default()
        };
        let host = ServiceHost::new(service(), options).unwrap();

        assert!(matches!(host.bind().await, Err(ControlError::Bind { .. })));
    }
}
