//! Error types for the control service host.
//!
//! The RPC operations themselves are infallible; everything here happens at
//! the transport boundary or while rendering the Prometheus surface.

use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("failed to bind control service to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("control service stopped serving: {0}")]
    Serve(#[source] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),
}
