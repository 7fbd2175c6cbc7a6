//! Greedy routing over the ring: one-hop routing decisions evaluated at a
//! peer, plus the bounded hop loop that drives a lookup to completion.

use tokio::time::timeout;
use tracing::trace;

use crate::error::RingError;
use crate::ring::node::{RingNode, Topology};
use crate::ring::oracle;
use crate::ring::registry::Directory;
use crate::ring::types::{NodeId, PeerInfo};
use crate::ring::{MAX_ROUTE_HOPS, RPC_TIMEOUT};

/// One hop's worth of routing progress, as decided locally by a peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteStep {
    /// The responsible peer has been identified.
    Done(PeerInfo),
    /// Not resolvable here; continue at this peer.
    Forward(PeerInfo),
}

impl RingNode {
    /// Finger-table entry closest below `target`, clockwise from this node.
    ///
    /// Scans the table from the highest index down and returns the first
    /// entry (other than this node itself) lying strictly between this node
    /// and the target. If no entry passes the test, the lowest-index entry is
    /// still returned as the best available hop; degrading beats failing.
    /// `None` only when there are neither fingers nor successors.
    pub async fn closest_preceding_node(&self, target: NodeId) -> Option<PeerInfo> {
        let topo = self.topology.read().await;
        self.closest_preceding_locked(&topo, target)
    }

    pub(crate) fn closest_preceding_locked(
        &self,
        topo: &Topology,
        target: NodeId,
    ) -> Option<PeerInfo> {
        if oracle::equal(self.id(), target) {
            return Some(self.info().clone());
        }
        if topo.fingers.is_empty() {
            return topo.successors.first().cloned();
        }
        let mut result = None;
        for entry in topo.fingers.iter().rev() {
            result = Some(entry);
            if !oracle::equal(self.id(), entry.id)
                && oracle::rotation_number(&[self.id(), entry.id, target]) == 1
            {
                break;
            }
        }
        result.cloned()
    }

    /// Evaluates the routing base cases against local state: the lookup is
    /// either answered here (this node or its immediate successor is
    /// responsible) or handed to the best preceding peer this node knows.
    pub async fn route_step(&self, target: NodeId) -> Result<RouteStep, RingError> {
        let topo = self.topology.read().await;
        let successor = topo.successors.first().ok_or(RingError::EmptyNode)?;
        if oracle::equal(self.id(), target) {
            return Ok(RouteStep::Done(self.info().clone()));
        }
        if oracle::rotation_number(&[self.id(), target, successor.id]) == 1 {
            return Ok(RouteStep::Done(successor.clone()));
        }
        match self.closest_preceding_locked(&topo, target) {
            Some(next) => Ok(RouteStep::Forward(next)),
            None => Err(RingError::NoRoute(target)),
        }
    }

    /// Locates the peer responsible for `target`, starting from this node.
    pub async fn locate_successor(
        &self,
        directory: &dyn Directory,
        target: NodeId,
    ) -> Result<PeerInfo, RingError> {
        locate_successor(directory, self.info(), target).await
    }
}

/// Iterative lookup loop, starting at `origin`.
///
/// Each iteration asks the current peer for one routing step over the
/// directory, under a per-hop deadline. The loop is bounded: stale or cyclic
/// finger references must not turn into an unbounded call chain.
pub async fn locate_successor(
    directory: &dyn Directory,
    origin: &PeerInfo,
    target: NodeId,
) -> Result<PeerInfo, RingError> {
    let mut current = origin.clone();
    for hop in 0..MAX_ROUTE_HOPS {
        let client = directory.connect(&current).await?;
        let step = timeout(RPC_TIMEOUT, client.route_step(target))
            .await
            .map_err(|_| RingError::Timeout {
                id: current.id,
                timeout: RPC_TIMEOUT,
            })??;
        match step {
            RouteStep::Done(peer) => {
                trace!(%target, %peer, hops = hop + 1, "lookup resolved");
                return Ok(peer);
            }
            RouteStep::Forward(next) => {
                // A peer forwarding to itself can make no further progress.
                if next.id == current.id {
                    return Err(RingError::NoRoute(target));
                }
                trace!(%target, from = %current, to = %next, "lookup forwarded");
                current = next;
            }
        }
    }
    Err(RingError::HopsExhausted {
        target,
        hops: MAX_ROUTE_HOPS,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ring::registry::LocalRegistry;
    use crate::ring::types::KeyHasher;

    fn decimal_hasher() -> KeyHasher {
        Arc::new(|key| NodeId::new(key.parse().unwrap_or(0)))
    }

    fn peer(id: u64) -> PeerInfo {
        PeerInfo {
            id: NodeId::new(id),
            address: id.to_string(),
        }
    }

    /// Wires `ids` into a ring the way a converged overlay would look:
    /// successor chain in listed order, predecessors reversed, one finger
    /// pointing at the immediate successor.
    async fn wire_ring(registry: &LocalRegistry, ids: &[u64]) -> Vec<Arc<RingNode>> {
        let mut nodes = Vec::new();
        for &id in ids {
            nodes.push(registry.register(RingNode::new(id.to_string(), 4, decimal_hasher())));
        }
        let len = nodes.len();
        for (k, node) in nodes.iter().enumerate() {
            let succ = nodes[(k + 1) % len].info().clone();
            let pred = nodes[(k + len - 1) % len].info().clone();
            node.install_topology(vec![succ.clone()], Some(pred), vec![succ])
                .await;
        }
        nodes
    }

    #[tokio::test]
    async fn single_node_ring_answers_everything() {
        let registry = LocalRegistry::new();
        let nodes = wire_ring(&registry, &[0]).await;
        for key in 0u64..3 {
            let found = nodes[0]
                .locate_successor(&registry, NodeId::new(key))
                .await
                .unwrap();
            assert_eq!(found.id, NodeId::new(0), "key {key}");
        }
    }

    #[tokio::test]
    async fn two_node_ring_ids_0_and_4() {
        let registry = LocalRegistry::new();
        let nodes = wire_ring(&registry, &[0, 4]).await;
        let expected = [0u64, 4, 4, 4, 4, 0, 0, 0, 0];
        for start in &nodes {
            for (key, want) in expected.iter().enumerate() {
                let found = start
                    .locate_successor(&registry, NodeId::new(key as u64))
                    .await
                    .unwrap();
                assert_eq!(
                    found.id,
                    NodeId::new(*want),
                    "key {key} from node {}",
                    start.id()
                );
            }
        }
    }

    #[tokio::test]
    async fn two_node_ring_ids_1_and_5() {
        let registry = LocalRegistry::new();
        let nodes = wire_ring(&registry, &[1, 5]).await;
        let expected = [1u64, 1, 5, 5, 5, 5, 1, 1, 1];
        for start in &nodes {
            for (key, want) in expected.iter().enumerate() {
                let found = start
                    .locate_successor(&registry, NodeId::new(key as u64))
                    .await
                    .unwrap();
                assert_eq!(
                    found.id,
                    NodeId::new(*want),
                    "key {key} from node {}",
                    start.id()
                );
            }
        }
    }

    #[tokio::test]
    async fn unjoined_node_is_an_explicit_error() {
        let registry = LocalRegistry::new();
        let node = registry.register(RingNode::new("7".to_string(), 4, decimal_hasher()));
        let err = node
            .locate_successor(&registry, NodeId::new(1))
            .await
            .unwrap_err();
        assert_eq!(err, RingError::EmptyNode);
    }

    #[tokio::test]
    async fn closest_preceding_without_any_references() {
        let node = RingNode::new("2".to_string(), 4, decimal_hasher());
        assert_eq!(node.closest_preceding_node(NodeId::new(1)).await, None);
    }

    #[tokio::test]
    async fn closest_preceding_falls_back_to_successor() {
        let node = RingNode::new("2".to_string(), 4, decimal_hasher());
        node.install_topology(vec![peer(6)], None, vec![]).await;
        assert_eq!(
            node.closest_preceding_node(NodeId::new(1)).await,
            Some(peer(6))
        );
    }

    #[tokio::test]
    async fn closest_preceding_scans_fingers_from_the_top() {
        let node = RingNode::new("2".to_string(), 4, decimal_hasher());
        node.install_topology(vec![], None, vec![peer(10), peer(20)])
            .await;
        let cases = [
            // No entry strictly between 2 and 1; farthest entry is the best hop.
            (1u64, 20u64),
            (10, 10),
            (11, 10),
            (20, 20),
            (21, 20),
        ];
        for (target, want) in cases {
            assert_eq!(
                node.closest_preceding_node(NodeId::new(target)).await,
                Some(peer(want)),
                "target {target}"
            );
        }
        // A lookup for the node's own identifier is answered by the node.
        assert_eq!(
            node.closest_preceding_node(NodeId::new(2)).await,
            Some(node.info().clone())
        );
    }
}
