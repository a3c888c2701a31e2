//! Outbound TCP dialing.
//!
//! [`NodeDialer`] is the seam between dial tasks and the operating
//! system's TCP stack. The production implementation is [`TcpDialer`];
//! tests substitute an implementation that fabricates or refuses
//! connections.

use crate::{Node, OverlayError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Opens TCP connections to nodes in the network.
#[async_trait]
pub trait NodeDialer: Send + Sync {
    /// Opens a TCP connection to `node`'s endpoint.
    async fn dial(&self, node: &Node) -> Result<TcpStream>;
}

/// Default timeout for TCP connection establishment.
const DIAL_TIMEOUT: Duration = Duration::from_secs(15);

/// [`NodeDialer`] backed by `tokio::net::TcpStream`.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    timeout: Duration,
}

impl TcpDialer {
    /// Creates a dialer with the default connect timeout.
    pub fn new() -> Self {
        Self {
            timeout: DIAL_TIMEOUT,
        }
    }

    /// Creates a dialer with a custom connect timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeDialer for TcpDialer {
    async fn dial(&self, node: &Node) -> Result<TcpStream> {
        let addr = node
            .tcp_addr()
            .ok_or_else(|| OverlayError::IncompleteNode(node.id()))?;

        debug!(node = %node, "dialing");
        let stream = timeout(self.timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| OverlayError::ConnectionTimeout(addr.to_string()))?
            .map_err(|e| OverlayError::ConnectionFailed(format!("{}: {}", addr, e)))?;

        // Disable Nagle's algorithm for lower latency.
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
