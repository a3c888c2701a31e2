//! Discovery table capability.
//!
//! The scheduler does not know how candidate nodes are found; it reaches
//! the node discovery subsystem through this trait. Production wires in
//! the DHT-backed table, tests substitute a deterministic fake.

use crate::Node;
use async_trait::async_trait;

/// Interface to the node discovery subsystem.
///
/// Implementations may be called from several tasks at once and are
/// responsible for their own synchronization.
#[async_trait]
pub trait DiscoverTable: Send + Sync {
    /// Asks the discovery network for the current endpoint of `node`.
    ///
    /// Returns `None` when the node could not be found.
    async fn resolve(&self, node: &Node) -> Option<Node>;

    /// Runs one random walk of the discovery network and returns the nodes
    /// it encountered.
    async fn lookup_random(&self) -> Vec<Node>;

    /// Copies up to `buf.len()` nodes from the table's known set into
    /// `buf`, returning how many entries were filled.
    fn read_random_nodes(&self, buf: &mut [Node]) -> usize;

    /// Shuts the table down.
    fn close(&self);
}
