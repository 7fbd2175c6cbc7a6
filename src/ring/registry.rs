//! The seam between the protocol core and whatever carries it between
//! processes.
//!
//! Topology state never holds live references into other nodes; it holds
//! [`PeerInfo`] and resolves it through a [`Directory`] at call time. A real
//! deployment implements these traits over an RPC stack; [`LocalRegistry`]
//! implements them in-process for simulation and tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::debug;

use crate::error::RingError;
use crate::ring::diagnostics::RingDump;
use crate::ring::node::RingNode;
use crate::ring::routing::RouteStep;
use crate::ring::types::{NodeId, PeerInfo};

/// Operations one peer can invoke on another. Mirrors the remote surface a
/// wire transport has to expose; every call is expected to be bounded-latency
/// on the caller's side.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// One routing decision evaluated at the remote peer.
    async fn route_step(&self, target: NodeId) -> Result<RouteStep, RingError>;

    /// The remote peer's current predecessor, if it knows one.
    async fn predecessor(&self) -> Result<Option<PeerInfo>, RingError>;

    /// The remote peer's successor list, head first.
    async fn successor_list(&self) -> Result<Vec<PeerInfo>, RingError>;

    /// Claim to be the remote peer's predecessor. Returns whether the claim
    /// was accepted; rejection is a normal convergence outcome.
    async fn notify(&self, claimant: PeerInfo) -> Result<bool, RingError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), RingError>;
}

/// Resolves a logical peer reference to a client for it. Failure to connect
/// is the liveness-failure signal the healing operations act on.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn connect(&self, peer: &PeerInfo) -> Result<Arc<dyn PeerClient>, RingError>;
}

/// In-process peer registry: id-to-node map plus a simulated failure set.
///
/// This is the single-process stand-in for both the remote-endpoint lookup
/// and the failure detector of a real deployment. Marking a node failed makes
/// every connection to it fail, which is exactly how the protocol observes a
/// crashed peer.
#[derive(Default)]
pub struct LocalRegistry {
    nodes: RwLock<HashMap<NodeId, Arc<RingNode>>>,
    down: RwLock<HashSet<NodeId>>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node to the registry and returns the shared handle to it.
    pub fn register(&self, node: RingNode) -> Arc<RingNode> {
        let node = Arc::new(node);
        self.nodes
            .write()
            .unwrap()
            .insert(node.id(), node.clone());
        node
    }

    pub fn get(&self, id: NodeId) -> Option<Arc<RingNode>> {
        self.nodes.read().unwrap().get(&id).cloned()
    }

    /// All registered nodes, failed ones included, ordered by identifier.
    pub fn nodes(&self) -> Vec<Arc<RingNode>> {
        let mut nodes: Vec<_> = self.nodes.read().unwrap().values().cloned().collect();
        nodes.sort_by_key(|n| n.id());
        nodes
    }

    /// Simulates a crash: every subsequent connection to the node fails.
    pub fn mark_failed(&self, id: NodeId) {
        self.down.write().unwrap().insert(id);
    }

    pub fn revive(&self, id: NodeId) {
        self.down.write().unwrap().remove(&id);
    }

    pub fn is_down(&self, id: NodeId) -> bool {
        self.down.read().unwrap().contains(&id)
    }

    /// Nodes currently reachable through the registry.
    pub fn live_nodes(&self) -> Vec<Arc<RingNode>> {
        self.nodes()
            .into_iter()
            .filter(|n| !self.is_down(n.id()))
            .collect()
    }

    /// One deterministic maintenance pass over every live node: stabilize,
    /// a full finger lap, predecessor and successor checks. Errors are
    /// expected under churn and only logged; maintenance never aborts.
    pub async fn maintenance_round(&self) {
        for node in self.live_nodes() {
            if let Err(err) = node.stabilize(self).await {
                debug!(node = %node.id(), %err, "stabilize skipped");
            }
            for _ in 0..=node.last_index() {
                if let Err(err) = node.fix_fingers(self).await {
                    debug!(node = %node.id(), %err, "finger refresh skipped");
                }
            }
            node.check_predecessor(self).await;
            node.check_successors(self).await;
        }
    }

    /// Runs `rounds` maintenance passes back to back. Enough rounds after a
    /// membership change bring the ring back to a single consistent cycle.
    pub async fn converge(&self, rounds: usize) {
        for _ in 0..rounds {
            self.maintenance_round().await;
        }
    }

    /// Read-only snapshot of every live node's ring edges, ordered by
    /// identifier.
    pub async fn dump(&self) -> RingDump {
        let nodes = self.live_nodes();
        let dumps = join_all(nodes.iter().map(|n| n.dump())).await;
        RingDump { nodes: dumps }
    }
}

#[async_trait]
impl Directory for LocalRegistry {
    async fn connect(&self, peer: &PeerInfo) -> Result<Arc<dyn PeerClient>, RingError> {
        if self.is_down(peer.id) {
            return Err(RingError::Unreachable {
                id: peer.id,
                address: peer.address.clone(),
            });
        }
        match self.get(peer.id) {
            Some(node) => Ok(Arc::new(LoopbackClient { node })),
            None => Err(RingError::Unreachable {
                id: peer.id,
                address: peer.address.clone(),
            }),
        }
    }
}

/// Client for a peer living in the same process: calls go straight to the
/// node's own state, under its own lock.
struct LoopbackClient {
    node: Arc<RingNode>,
}

#[async_trait]
impl PeerClient for LoopbackClient {
    async fn route_step(&self, target: NodeId) -> Result<RouteStep, RingError> {
        self.node.route_step(target).await
    }

    async fn predecessor(&self) -> Result<Option<PeerInfo>, RingError> {
        Ok(self.node.predecessor().await)
    }

    async fn successor_list(&self) -> Result<Vec<PeerInfo>, RingError> {
        Ok(self.node.successor_list().await)
    }

    async fn notify(&self, claimant: PeerInfo) -> Result<bool, RingError> {
        Ok(self.node.notify(claimant).await)
    }

    async fn ping(&self) -> Result<(), RingError> {
        Ok(())
    }
}
