//! Units of work handed from the scheduler to the host loop.
//!
//! The scheduler plans; the host executes. Each call to
//! [`DialScheduler::new_tasks`] returns a batch of [`Task`]s which the host
//! runs concurrently, reporting each one back through
//! [`DialScheduler::task_done`] when it finishes. Three kinds exist:
//!
//! - [`DialTask`] - attempt one outbound connection, resolving the
//!   destination's endpoint through discovery first when it is unknown
//! - [`DiscoverTask`] - run one rate-limited random discovery lookup to
//!   refill the scheduler's candidate pool
//! - [`WaitExpireTask`] - sleep until the next dial-history entry expires,
//!   so the host loop ticks again even when nothing else is pending
//!
//! [`DialScheduler::new_tasks`]: crate::DialScheduler::new_tasks
//! [`DialScheduler::task_done`]: crate::DialScheduler::task_done

use crate::{
    ConnFlags, DiscoverTable, Node, NodeDialer, Result, INITIAL_RESOLVE_DELAY, LOOKUP_INTERVAL,
    MAX_RESOLVE_DELAY,
};
use async_trait::async_trait;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Host-side context that tasks run against.
///
/// The server loop owning the scheduler implements this to hand tasks the
/// dialer, the discovery table, and the connection setup path. A single
/// instance is shared by all concurrently running tasks.
#[async_trait]
pub trait Server: Send + Sync {
    /// The dialer used for outbound TCP connections.
    fn dialer(&self) -> &dyn NodeDialer;

    /// The discovery table, if discovery is enabled.
    fn discovery(&self) -> Option<&dyn DiscoverTable>;

    /// When the last random discovery lookup started.
    fn last_lookup(&self) -> Option<Instant>;

    /// Records the start of a random discovery lookup.
    fn set_last_lookup(&self, now: Instant);

    /// Takes ownership of a freshly opened connection and runs the
    /// protocol handshake on it.
    async fn setup_conn(&self, stream: TcpStream, flags: ConnFlags, dest: &Node) -> Result<()>;
}

/// A unit of work produced by the scheduler.
///
/// Tasks are owned by the scheduler until returned from `new_tasks`, by
/// the host while running, and by the scheduler again once passed to
/// `task_done`.
#[derive(Debug)]
pub enum Task {
    /// Attempt one outbound connection.
    Dial(DialTask),
    /// Run one random discovery lookup.
    Discover(DiscoverTask),
    /// Sleep until the next dial-history entry expires.
    WaitExpire(WaitExpireTask),
}

impl Task {
    /// Runs the task to completion.
    ///
    /// Tasks never fail the host loop; dial and lookup errors are logged
    /// and absorbed, and the scheduler's dial history provides the
    /// back-pressure against retrying too eagerly.
    pub async fn run(&mut self, srv: &dyn Server) {
        match self {
            Task::Dial(t) => t.run(srv).await,
            Task::Discover(t) => t.run(srv).await,
            Task::WaitExpire(t) => t.run().await,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Dial(t) => fmt::Display::fmt(t, f),
            Task::Discover(t) => fmt::Display::fmt(t, f),
            Task::WaitExpire(t) => fmt::Display::fmt(t, f),
        }
    }
}

/// One outbound connection attempt.
///
/// The fields are owned by the running task; the scheduler reads them back
/// only after `task_done`, when ownership returns to it.
#[derive(Debug, Clone)]
pub struct DialTask {
    pub(crate) flags: ConnFlags,
    pub(crate) dest: Node,
    pub(crate) last_resolved: Option<Instant>,
    pub(crate) resolve_delay: Duration,
}

impl DialTask {
    pub(crate) fn new(flags: ConnFlags, dest: Node) -> Self {
        Self {
            flags,
            dest,
            last_resolved: None,
            resolve_delay: Duration::ZERO,
        }
    }

    /// The connection flags this dial will carry.
    pub fn flags(&self) -> ConnFlags {
        self.flags
    }

    /// The destination node.
    pub fn dest(&self) -> &Node {
        &self.dest
    }

    /// The current endpoint-resolution backoff.
    pub fn resolve_delay(&self) -> Duration {
        self.resolve_delay
    }

    pub(crate) async fn run(&mut self, srv: &dyn Server) {
        if self.dest.incomplete() && !self.resolve(srv).await {
            return;
        }

        if let Err(err) = self.dial(srv).await {
            trace!(task = %self, %err, "dial error");
            // Static nodes may have moved; re-resolve and retry once.
            if err.is_dial_failure() && self.flags.contains(ConnFlags::STATIC_DIALED) {
                if self.resolve(srv).await {
                    let _ = self.dial(srv).await;
                }
            }
        }
    }

    async fn resolve(&mut self, srv: &dyn Server) -> bool {
        self.resolve_at(srv, Instant::now()).await
    }

    /// Attempts to find the current endpoint for the destination using
    /// discovery.
    ///
    /// Resolve operations are throttled with bounded backoff so the
    /// discovery network is not flooded with queries for nodes that don't
    /// exist. The backoff resets when the node is found. Takes the clock
    /// as an argument so the throttle can be exercised deterministically.
    pub(crate) async fn resolve_at(&mut self, srv: &dyn Server, now: Instant) -> bool {
        let Some(table) = srv.discovery() else {
            debug!(id = %self.dest.id(), "can't resolve node, discovery is disabled");
            return false;
        };
        if self.resolve_delay.is_zero() {
            self.resolve_delay = INITIAL_RESOLVE_DELAY;
        }
        if let Some(last) = self.last_resolved {
            if now.saturating_duration_since(last) < self.resolve_delay {
                return false;
            }
        }

        let resolved = table.resolve(&self.dest).await;
        self.last_resolved = Some(now);
        match resolved {
            None => {
                self.resolve_delay = (self.resolve_delay * 2).min(MAX_RESOLVE_DELAY);
                debug!(
                    id = %self.dest.id(),
                    new_delay = ?self.resolve_delay,
                    "resolving node failed"
                );
                false
            }
            Some(node) => {
                self.resolve_delay = INITIAL_RESOLVE_DELAY;
                self.dest = node;
                debug!(node = %self.dest, "resolved node");
                true
            }
        }
    }

    async fn dial(&self, srv: &dyn Server) -> Result<()> {
        let stream = srv.dialer().dial(&self.dest).await?;
        srv.setup_conn(stream, self.flags, &self.dest).await
    }
}

impl fmt::Display for DialTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.flags, self.dest)
    }
}

/// One random discovery lookup.
///
/// The scheduler keeps at most one discover task in flight. Lookups are
/// also rate limited here so a fast host loop cannot spin the discovery
/// network.
#[derive(Debug, Default)]
pub struct DiscoverTask {
    pub(crate) results: Vec<Node>,
}

impl DiscoverTask {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The nodes found by the lookup.
    pub fn results(&self) -> &[Node] {
        &self.results
    }

    pub(crate) async fn run(&mut self, srv: &dyn Server) {
        if let Some(next) = srv.last_lookup().map(|last| last + LOOKUP_INTERVAL) {
            let now = Instant::now();
            if now < next {
                tokio::time::sleep(next - now).await;
            }
        }
        srv.set_last_lookup(Instant::now());

        let Some(table) = srv.discovery() else {
            debug!("discovery lookup skipped, discovery is disabled");
            return;
        };
        self.results = table.lookup_random().await;
    }
}

impl fmt::Display for DiscoverTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "discovery lookup")?;
        if !self.results.is_empty() {
            write!(f, " ({} results)", self.results.len())?;
        }
        Ok(())
    }
}

/// A sleep that keeps the host loop ticking.
///
/// Scheduled when no dial or lookup is pending but history entries will
/// expire and reopen dial opportunities.
#[derive(Debug, Clone, Copy)]
pub struct WaitExpireTask {
    pub(crate) duration: Duration,
}

impl WaitExpireTask {
    /// How long the task sleeps.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub(crate) async fn run(&self) {
        tokio::time::sleep(self.duration).await;
    }
}

impl fmt::Display for WaitExpireTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wait for dial history expiry ({:?})", self.duration)
    }
}
