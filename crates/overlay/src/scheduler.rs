//! The dial scheduler.
//!
//! [`DialScheduler`] plans outbound connections for the host's server
//! loop. On every iteration the loop calls
//! [`new_tasks`](DialScheduler::new_tasks) with the current peer set and
//! executes whatever tasks come back, reporting each one through
//! [`task_done`](DialScheduler::task_done) when it finishes. The planner
//! interleaves several policies:
//!
//! - statically configured peers are always kept connected
//! - dynamic dials fill the remaining budget from discovery candidates
//! - recently dialed nodes are suppressed for a cooldown window
//! - a peerless node falls back to its bootstrap list, round-robin
//! - random discovery lookups refill the candidate pool, one at a time
//!
//! The scheduler is single-owner: both methods are called only from the
//! server loop, never re-entrantly, so no internal locking is needed.
//! Neither method suspends.

use crate::history::DialHistory;
use crate::task::{DialTask, DiscoverTask, Task, WaitExpireTask};
use crate::{
    ConnFlags, DialerConfig, DiscoverTable, Netlist, Node, DIAL_HISTORY_EXPIRATION,
    FALLBACK_INTERVAL,
};
use calder_common::NodeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{trace, warn};

/// Why a candidate was not dialed.
///
/// These are scheduling signals, not user-facing errors. `IsSelf` and
/// `NotWhitelisted` are permanent for a given node and additionally evict
/// it from the static set; the others resolve themselves on later ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DialReject {
    /// A dial task for this node is already in flight.
    #[error("already dialing")]
    AlreadyDialing,
    /// The node is already a connected peer.
    #[error("already connected")]
    AlreadyConnected,
    /// The node is ourselves.
    #[error("is self")]
    IsSelf,
    /// The node's IP is outside the configured netrestrict list.
    #[error("not contained in netrestrict list")]
    NotWhitelisted,
    /// The node is still in the dial history cooldown.
    #[error("recently dialed")]
    RecentlyDialed,
}

/// Read access to a connected peer's connection flags.
///
/// The scheduler needs nothing else from the host's peer objects. It is
/// implemented for [`ConnFlags`] itself so a bare `HashMap<NodeId,
/// ConnFlags>` works as a peer set.
pub trait PeerFlags {
    /// True when the peer's connection carries `flag`.
    fn is(&self, flag: ConnFlags) -> bool;
}

impl PeerFlags for ConnFlags {
    fn is(&self, flag: ConnFlags) -> bool {
        self.contains(flag)
    }
}

/// Plans outbound dials and discovery lookups.
pub struct DialScheduler {
    max_dyn_dials: usize,
    self_id: NodeId,
    discovery: Option<Arc<dyn DiscoverTable>>,
    netrestrict: Option<Netlist>,
    /// One entry per statically configured peer. An in-flight static dial
    /// is written back here by `task_done` so its resolve backoff
    /// survives across attempts.
    static_tasks: HashMap<NodeId, DialTask>,
    /// Ids with a dial task currently in flight.
    dialing: HashMap<NodeId, ConnFlags>,
    /// Unused candidates from past discovery lookups, consumed front first.
    lookup_buf: Vec<Node>,
    /// Scratch buffer for `read_random_nodes`.
    random_nodes: Vec<Node>,
    /// Rotated left by one on every bootstrap fallback.
    bootnodes: Vec<Node>,
    hist: DialHistory,
    lookup_running: bool,
    /// Captured on the first `new_tasks` call; bootstrap fallback stays
    /// quiet until `FALLBACK_INTERVAL` past this.
    start: Option<Instant>,
}

impl DialScheduler {
    /// Creates a scheduler for the node `self_id`.
    ///
    /// `discovery` may be `None` when the host runs without a discovery
    /// table; dynamic dials are then limited to the bootstrap list and
    /// whatever the host feeds through static configuration.
    pub fn new(
        config: DialerConfig,
        self_id: NodeId,
        discovery: Option<Arc<dyn DiscoverTable>>,
    ) -> Self {
        let DialerConfig {
            max_dyn_dials,
            static_nodes,
            bootnodes,
            netrestrict,
        } = config;

        let mut scheduler = Self {
            max_dyn_dials,
            self_id,
            discovery,
            netrestrict,
            static_tasks: HashMap::new(),
            dialing: HashMap::new(),
            lookup_buf: Vec::new(),
            random_nodes: vec![Node::default(); max_dyn_dials / 2],
            bootnodes,
            hist: DialHistory::new(),
            lookup_running: false,
            start: None,
        };
        for node in static_nodes {
            scheduler.add_static(node);
        }
        scheduler
    }

    /// Registers a statically configured peer.
    ///
    /// Overwrites any existing entry, resetting its resolve state, which
    /// is how operators force a re-resolve.
    pub fn add_static(&mut self, node: Node) {
        self.static_tasks
            .insert(node.id(), DialTask::new(ConnFlags::STATIC_DIALED, node));
    }

    /// Unregisters a static peer.
    ///
    /// Also clears the node's dial history entry so the host can
    /// reconnect to it immediately.
    pub fn remove_static(&mut self, node: &Node) {
        self.static_tasks.remove(&node.id());
        self.hist.remove(node.id());
    }

    /// True when `id` is statically configured.
    pub fn contains_static(&self, id: &NodeId) -> bool {
        self.static_tasks.contains_key(id)
    }

    /// The bootstrap list in its current rotation order.
    pub fn bootnodes(&self) -> &[Node] {
        &self.bootnodes
    }

    /// Number of dial tasks currently in flight.
    pub fn dialing_count(&self) -> usize {
        self.dialing.len()
    }

    /// Decides whether `node` may be dialed right now.
    pub fn check_dial<P: PeerFlags>(
        &self,
        node: &Node,
        peers: &HashMap<NodeId, P>,
    ) -> Result<(), DialReject> {
        if self.dialing.contains_key(&node.id()) {
            return Err(DialReject::AlreadyDialing);
        }
        if peers.contains_key(&node.id()) {
            return Err(DialReject::AlreadyConnected);
        }
        if node.id() == self.self_id {
            return Err(DialReject::IsSelf);
        }
        if let Some(list) = &self.netrestrict {
            if !node.ip().is_some_and(|ip| list.contains(ip)) {
                return Err(DialReject::NotWhitelisted);
            }
        }
        if self.hist.contains(node.id()) {
            return Err(DialReject::RecentlyDialed);
        }
        Ok(())
    }

    /// Computes the tasks the host should launch this tick.
    ///
    /// `n_running` is the number of tasks from earlier ticks still in
    /// flight and `peers` the currently connected peer set, which must be
    /// stable for the duration of the call.
    pub fn new_tasks<P: PeerFlags>(
        &mut self,
        n_running: usize,
        peers: &HashMap<NodeId, P>,
        now: Instant,
    ) -> Vec<Task> {
        let start = *self.start.get_or_insert(now);
        let mut tasks: Vec<Task> = Vec::new();

        // Compute the number of dynamic dials needed at this point.
        let mut need_dyn = self.max_dyn_dials;
        for peer in peers.values() {
            if peer.is(ConnFlags::DYN_DIALED) {
                need_dyn = need_dyn.saturating_sub(1);
            }
        }
        for flags in self.dialing.values() {
            if flags.contains(ConnFlags::DYN_DIALED) {
                need_dyn = need_dyn.saturating_sub(1);
            }
        }

        // Expire the dial history on every invocation.
        self.hist.expire(now);

        // Create dials for static nodes that are not connected. Permanent
        // rejections evict the entry; transient ones leave it for a later
        // tick. Removals are collected first so the map is not mutated
        // mid-iteration.
        let mut evict: Vec<NodeId> = Vec::new();
        let mut launch: Vec<NodeId> = Vec::new();
        for (id, task) in &self.static_tasks {
            match self.check_dial(task.dest(), peers) {
                Err(err @ (DialReject::NotWhitelisted | DialReject::IsSelf)) => {
                    warn!(node = %task.dest(), %err, "removing static dial candidate");
                    evict.push(*id);
                }
                Ok(()) => launch.push(*id),
                Err(_) => {}
            }
        }
        for id in evict {
            self.static_tasks.remove(&id);
        }
        for id in launch {
            if let Some(task) = self.static_tasks.get(&id) {
                self.dialing.insert(id, task.flags());
                tasks.push(Task::Dial(task.clone()));
            }
        }

        // If we don't have any peers whatsoever, try to dial a random
        // bootnode. This is useful for small networks where the discovery
        // table may be full of mostly bad peers, making it hard to find
        // good ones.
        if peers.is_empty()
            && !self.bootnodes.is_empty()
            && need_dyn > 0
            && now.saturating_duration_since(start) > FALLBACK_INTERVAL
        {
            self.bootnodes.rotate_left(1);
            if let Some(bootnode) = self.bootnodes.last().cloned() {
                if self.try_dial(&mut tasks, ConnFlags::DYN_DIALED, &bootnode, peers) {
                    need_dyn -= 1;
                }
            }
        }

        // Use random nodes from the table for half of the necessary
        // dynamic dials.
        let random_candidates = need_dyn / 2;
        if random_candidates > 0 {
            if let Some(table) = self.discovery.clone() {
                let filled = table
                    .read_random_nodes(&mut self.random_nodes)
                    .min(self.random_nodes.len());
                for i in 0..random_candidates.min(filled) {
                    let node = self.random_nodes[i].clone();
                    if self.try_dial(&mut tasks, ConnFlags::DYN_DIALED, &node, peers) {
                        need_dyn -= 1;
                    }
                }
            }
        }

        // Create dynamic dials from lookup results, removing tried items
        // from the buffer whether or not the dial was admitted.
        let mut consumed = 0;
        while consumed < self.lookup_buf.len() && need_dyn > 0 {
            let node = self.lookup_buf[consumed].clone();
            consumed += 1;
            if self.try_dial(&mut tasks, ConnFlags::DYN_DIALED, &node, peers) {
                need_dyn -= 1;
            }
        }
        self.lookup_buf.drain(..consumed);

        // Launch a discovery lookup if more candidates are needed.
        if self.lookup_buf.len() < need_dyn && !self.lookup_running {
            self.lookup_running = true;
            tasks.push(Task::Discover(DiscoverTask::new()));
        }

        // Wait for the next history entry to expire if all candidates have
        // been tried and nothing is running, so the host loop still ticks.
        if n_running == 0 && tasks.is_empty() {
            if let Some(min) = self.hist.min() {
                tasks.push(Task::WaitExpire(WaitExpireTask {
                    duration: min.exp.saturating_duration_since(now),
                }));
            }
        }

        tasks
    }

    /// Records a finished task.
    ///
    /// Dialed nodes enter the history whether the dial succeeded or
    /// failed; the cooldown is what prevents reconnection storms after a
    /// drop.
    pub fn task_done(&mut self, task: Task, now: Instant) {
        match task {
            Task::Dial(task) => {
                let id = task.dest().id();
                self.hist.add(id, now + DIAL_HISTORY_EXPIRATION);
                self.dialing.remove(&id);
                if task.flags().contains(ConnFlags::STATIC_DIALED) {
                    if let Some(slot) = self.static_tasks.get_mut(&id) {
                        *slot = task;
                    }
                }
            }
            Task::Discover(task) => {
                self.lookup_running = false;
                self.lookup_buf.extend(task.results);
            }
            Task::WaitExpire(_) => {}
        }
    }

    /// Admits `node` as a new dial if `check_dial` allows it, recording
    /// the in-flight entry and appending the task.
    fn try_dial<P: PeerFlags>(
        &mut self,
        tasks: &mut Vec<Task>,
        flags: ConnFlags,
        node: &Node,
        peers: &HashMap<NodeId, P>,
    ) -> bool {
        if let Err(err) = self.check_dial(node, peers) {
            trace!(node = %node, %err, "skipping dial candidate");
            return false;
        }
        self.dialing.insert(node.id(), flags);
        tasks.push(Task::Dial(DialTask::new(flags, node.clone())));
        true
    }
}
