//! Error types for overlay dialing.

use calder_common::NodeId;
use thiserror::Error;

/// Errors that can occur while dialing and setting up peer connections.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// TCP connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection attempt timed out.
    #[error("connection timeout: {0}")]
    ConnectionTimeout(String),

    /// The destination's endpoint is not fully known.
    #[error("node {0} has no known endpoint")]
    IncompleteNode(NodeId),

    /// The host rejected the freshly opened connection during setup.
    #[error("connection setup failed: {0}")]
    SetupFailed(String),

    /// Discovery is not available on this server.
    #[error("discovery is disabled")]
    DiscoveryDisabled,

    /// A CIDR mask in a netlist could not be parsed.
    #[error("invalid netlist entry: {0}")]
    InvalidNetlist(String),

    /// Low-level I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OverlayError {
    /// True for socket-level failures of the dial itself.
    ///
    /// A static dial task re-resolves its destination and retries once when
    /// the first attempt fails with one of these. Errors raised later, while
    /// the host sets the connection up, do not trigger the retry.
    pub fn is_dial_failure(&self) -> bool {
        matches!(
            self,
            OverlayError::ConnectionFailed(_)
                | OverlayError::ConnectionTimeout(_)
                | OverlayError::IncompleteNode(_)
                | OverlayError::Io(_)
        )
    }
}
