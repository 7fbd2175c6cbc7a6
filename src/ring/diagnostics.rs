//! Read-only export of the ring's edges, for inspection and tooling. Not
//! required for correctness.

use serde::Serialize;

use crate::ring::types::{Liveness, NodeId};

/// One node's view of its neighborhood.
#[derive(Clone, Debug, Serialize)]
pub struct NodeDump {
    pub id: NodeId,
    pub address: String,
    pub successors: Vec<NodeId>,
    pub predecessor: Option<NodeId>,
    pub fingers: Vec<NodeId>,
    pub predecessor_liveness: Option<Liveness>,
}

/// Snapshot of every live node's edges, ordered by identifier.
#[derive(Clone, Debug, Serialize)]
pub struct RingDump {
    pub nodes: Vec<NodeDump>,
}

impl RingDump {
    /// True when the successor pointers form one cycle visiting every node
    /// exactly once and the predecessor pointers are its exact reverse. This
    /// is the convergence target of the stabilization protocol.
    pub fn is_converged(&self) -> bool {
        let n = self.nodes.len();
        if n == 0 {
            return false;
        }
        let position = |id: NodeId| self.nodes.iter().position(|d| d.id == id);
        let mut visited = vec![false; n];
        let mut at = 0usize;
        for _ in 0..n {
            if visited[at] {
                return false;
            }
            visited[at] = true;
            let Some(next_id) = self.nodes[at].successors.first() else {
                return false;
            };
            let Some(next) = position(*next_id) else {
                return false;
            };
            // The predecessor edge must mirror the successor edge.
            if self.nodes[next].predecessor != Some(self.nodes[at].id) {
                return false;
            }
            at = next;
        }
        at == 0 && visited.iter().all(|&v| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump(edges: &[(u64, u64, Option<u64>)]) -> RingDump {
        RingDump {
            nodes: edges
                .iter()
                .map(|&(id, succ, pred)| NodeDump {
                    id: NodeId::new(id),
                    address: id.to_string(),
                    successors: vec![NodeId::new(succ)],
                    predecessor: pred.map(NodeId::new),
                    fingers: vec![],
                    predecessor_liveness: None,
                })
                .collect(),
        }
    }

    #[test]
    fn detects_a_closed_ring() {
        assert!(dump(&[(0, 4, Some(9)), (4, 9, Some(0)), (9, 0, Some(4))]).is_converged());
        assert!(dump(&[(7, 7, Some(7))]).is_converged());
    }

    #[test]
    fn rejects_broken_rings() {
        // Successor chain short-circuits past node 4.
        assert!(!dump(&[(0, 9, Some(9)), (4, 9, Some(0)), (9, 0, Some(4))]).is_converged());
        // Predecessor edge does not mirror the successor edge.
        assert!(!dump(&[(0, 4, Some(4)), (4, 0, Some(0))]).is_converged());
        // Unknown predecessor.
        assert!(!dump(&[(0, 0, None)]).is_converged());
    }

    #[test]
    fn serializes_to_json() {
        let text = serde_json::to_string(&dump(&[(0, 4, None), (4, 0, Some(0))])).unwrap();
        assert!(text.contains("\"successors\""));
    }
}
