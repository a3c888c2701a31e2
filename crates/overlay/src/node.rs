//! Node records for the overlay network.
//!
//! A [`Node`] identifies a remote peer by its [`NodeId`] and, when known,
//! its TCP endpoint. Nodes learned from a discovery walk can arrive with
//! the endpoint missing; such nodes are *incomplete* and must be resolved
//! through discovery before they can be dialed.

use calder_common::NodeId;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// A remote node on the overlay network.
///
/// The dial scheduler treats nodes as opaque apart from the identifier and
/// the endpoint accessors; every other attribute belongs to discovery.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    id: NodeId,
    ip: Option<IpAddr>,
    tcp_port: Option<u16>,
    udp_port: Option<u16>,
}

impl Node {
    /// Creates a node with a known TCP endpoint.
    ///
    /// The UDP discovery port defaults to the TCP port; use
    /// [`with_udp`](Node::with_udp) when they differ.
    pub fn new(id: NodeId, ip: IpAddr, tcp_port: u16) -> Self {
        Self {
            id,
            ip: Some(ip),
            tcp_port: Some(tcp_port),
            udp_port: Some(tcp_port),
        }
    }

    /// Creates a node known only by its identifier.
    ///
    /// The endpoint must be resolved through discovery before dialing.
    pub fn with_id(id: NodeId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Replaces the UDP discovery port.
    pub fn with_udp(mut self, udp_port: u16) -> Self {
        self.udp_port = Some(udp_port);
        self
    }

    /// The node's identifier.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node's IP address, if known.
    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    /// The node's TCP port, if known.
    pub fn tcp(&self) -> Option<u16> {
        self.tcp_port
    }

    /// The node's UDP discovery port, if known.
    pub fn udp(&self) -> Option<u16> {
        self.udp_port
    }

    /// True when the TCP endpoint is not fully known.
    pub fn incomplete(&self) -> bool {
        self.ip.is_none() || self.tcp_port.is_none()
    }

    /// The socket address to dial, if the node is complete.
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        Some(SocketAddr::new(self.ip?, self.tcp_port?))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tcp_addr() {
            Some(addr) => write!(f, "{}@{}", self.id.short_hex(), addr),
            None => write!(f, "{} (incomplete)", self.id.short_hex()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> NodeId {
        NodeId::from_bytes([byte; 32])
    }

    #[test]
    fn test_complete_node() {
        let node = Node::new(id(1), "10.0.0.1".parse().unwrap(), 30303);
        assert!(!node.incomplete());
        assert_eq!(node.tcp(), Some(30303));
        assert_eq!(node.udp(), Some(30303));
        assert_eq!(
            node.tcp_addr(),
            Some("10.0.0.1:30303".parse::<SocketAddr>().unwrap())
        );
    }

    #[test]
    fn test_incomplete_node() {
        let node = Node::with_id(id(2));
        assert!(node.incomplete());
        assert_eq!(node.ip(), None);
        assert_eq!(node.tcp_addr(), None);
    }

    #[test]
    fn test_display() {
        let node = Node::new(id(0x0f), "192.0.2.7".parse().unwrap(), 30303);
        assert_eq!(node.to_string(), "0f0f0f0f0f0f0f0f@192.0.2.7:30303");

        let node = Node::with_id(id(0x0f));
        assert_eq!(node.to_string(), "0f0f0f0f0f0f0f0f (incomplete)");
    }
}
