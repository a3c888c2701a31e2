//! Outbound dial scheduling for the calder overlay network.
//!
//! This crate decides which remote nodes a server should attempt TCP
//! connections to, and when to ask discovery for fresh candidates. It
//! provides:
//!
//! - **Dial planning** - A deterministic planner that balances statically
//!   configured peers against a budget of dynamically discovered ones
//! - **Duplicate suppression** - A time-windowed dial history so a node is
//!   not redialed before its cooldown expires
//! - **Endpoint resolution** - Bounded-backoff resolution through
//!   discovery for nodes whose endpoint is unknown
//! - **Bootstrap fallback** - Round-robin dialing of well-known bootnodes
//!   when the node has no peers at all
//!
//! # Architecture
//!
//! The crate is organized around these key components:
//!
//! - [`DialScheduler`] - The planner. Its two methods,
//!   [`new_tasks`](DialScheduler::new_tasks) and
//!   [`task_done`](DialScheduler::task_done), are the whole contract with
//!   the host's server loop
//! - [`Task`] - The units of work the planner emits: dial attempts,
//!   discovery lookups, and idle keep-alive sleeps
//! - [`Server`] - The capability bundle tasks run against: the
//!   [`NodeDialer`], the [`DiscoverTable`], and the host's connection
//!   setup path
//!
//! The scheduler itself never touches the network. It is owned and driven
//! by a single server loop; the tasks it hands out run concurrently and
//! report back through `task_done`.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::time::Instant;
//! use calder_common::NodeId;
//! use calder_overlay::{ConnFlags, DialScheduler, DialerConfig};
//!
//! let config = DialerConfig {
//!     max_dyn_dials: 16,
//!     ..Default::default()
//! };
//! let mut scheduler = DialScheduler::new(config, NodeId::from_bytes([7u8; 32]), None);
//!
//! // Each server-loop tick: ask for work, run it, report completions.
//! let peers: HashMap<NodeId, ConnFlags> = HashMap::new();
//! let tasks = scheduler.new_tasks(0, &peers, Instant::now());
//! # let _ = tasks;
//! ```

mod dialer;
mod discovery;
mod error;
mod history;
mod netlist;
mod node;
mod scheduler;
mod task;

pub use dialer::{NodeDialer, TcpDialer};
pub use discovery::DiscoverTable;
pub use error::OverlayError;
pub use history::{DialHistory, PastDial};
pub use netlist::{IpMask, Netlist};
pub use node::Node;
pub use scheduler::{DialReject, DialScheduler, PeerFlags};
pub use task::{DialTask, DiscoverTask, Server, Task, WaitExpireTask};

use std::time::Duration;

/// Result type for overlay operations.
pub type Result<T> = std::result::Result<T, OverlayError>;

/// How long a dialed node stays in the history before it may be redialed.
pub const DIAL_HISTORY_EXPIRATION: Duration = Duration::from_secs(30);

/// Minimum gap between two random discovery lookups.
pub const LOOKUP_INTERVAL: Duration = Duration::from_secs(4);

/// How long a peerless node waits before falling back to its bootnodes.
pub const FALLBACK_INTERVAL: Duration = Duration::from_secs(20);

/// Starting backoff between endpoint resolution attempts.
pub const INITIAL_RESOLVE_DELAY: Duration = Duration::from_secs(60);

/// Upper bound on the endpoint resolution backoff.
pub const MAX_RESOLVE_DELAY: Duration = Duration::from_secs(60 * 60);

bitflags::bitflags! {
    /// How a connection came to exist.
    ///
    /// Every outbound dial and every connected peer carries one of these.
    /// The scheduler counts `DYN_DIALED` connections against its dial
    /// budget and gives `STATIC_DIALED` ones the retry-after-resolve
    /// treatment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConnFlags: u8 {
        /// Outbound connection to a node found through discovery.
        const DYN_DIALED = 1 << 0;
        /// Outbound connection to an operator-configured peer.
        const STATIC_DIALED = 1 << 1;
        /// Connection accepted from a remote node.
        const INBOUND = 1 << 2;
    }
}

/// Configuration for the dial scheduler.
///
/// # Example
///
/// ```rust
/// use calder_overlay::{DialerConfig, Netlist};
///
/// let config = DialerConfig {
///     max_dyn_dials: 8,
///     netrestrict: Some(Netlist::parse("10.0.0.0/8").unwrap()),
///     ..Default::default()
/// };
/// assert!(config.static_nodes.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct DialerConfig {
    /// Maximum number of dynamically dialed peers.
    ///
    /// Connected peers and in-flight dials with `DYN_DIALED` both count
    /// against this budget.
    pub max_dyn_dials: usize,

    /// Statically configured peers the scheduler always keeps connected.
    pub static_nodes: Vec<Node>,

    /// Well-known nodes dialed round-robin when the node is peerless for
    /// longer than [`FALLBACK_INTERVAL`].
    pub bootnodes: Vec<Node>,

    /// When set, only destinations whose IP falls inside one of these
    /// networks are dialed.
    pub netrestrict: Option<Netlist>,
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            max_dyn_dials: 16,
            static_nodes: Vec::new(),
            bootnodes: Vec::new(),
            netrestrict: None,
        }
    }
}
