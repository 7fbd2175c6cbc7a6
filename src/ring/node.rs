use tokio::sync::RwLock;

use crate::ring::diagnostics::NodeDump;
use crate::ring::types::{KeyHasher, NodeId, PeerInfo, ProbeRecord};

/// Per-peer topology state. Owned exclusively by the node it belongs to and
/// mutated only by that node's own maintenance operations; inbound routing
/// requests take the read side of the lock.
#[derive(Default)]
pub(crate) struct Topology {
    /// Clockwise-nearest peers; element 0 is the immediate successor and is
    /// non-empty once the node is ring-resident.
    pub(crate) successors: Vec<PeerInfo>,
    /// Nearest counter-clockwise peer, if known.
    pub(crate) predecessor: Option<PeerInfo>,
    /// Routing shortcuts; entry k aims at the successor of `id + 2^k`. May be
    /// shorter than its bound and may hold stale entries.
    pub(crate) fingers: Vec<PeerInfo>,
    /// Rotating cursor; one finger entry is refreshed per maintenance tick.
    pub(crate) next_finger: u32,
    /// Liveness verdict for the current predecessor.
    pub(crate) probe: Option<ProbeRecord>,
}

/// One peer of the overlay.
///
/// Identity is fixed at construction: `id = hash(address)`. Everything else
/// drifts under churn and is pulled back by the membership protocol.
pub struct RingNode {
    info: PeerInfo,
    last_index: u32,
    hasher: KeyHasher,
    pub(crate) topology: RwLock<Topology>,
}

impl RingNode {
    /// Builds a node bound to `address`, with a finger table bounded at
    /// `last_index + 1` entries and the given key hasher. The node is not yet
    /// resident in any ring.
    pub fn new(address: impl Into<String>, last_index: u32, hasher: KeyHasher) -> Self {
        let address = address.into();
        let id = hasher(&address);
        RingNode {
            info: PeerInfo { id, address },
            last_index,
            hasher,
            topology: RwLock::new(Topology::default()),
        }
    }

    pub fn id(&self) -> NodeId {
        self.info.id
    }

    pub fn address(&self) -> &str {
        &self.info.address
    }

    pub fn info(&self) -> &PeerInfo {
        &self.info
    }

    /// Highest finger index; the table never grows past `last_index + 1`.
    pub fn last_index(&self) -> u32 {
        self.last_index
    }

    /// Maps a storage key into the identifier space with this node's hasher.
    pub fn hash_key(&self, key: &str) -> NodeId {
        (self.hasher)(key)
    }

    /// Immediate successor, if the node is ring-resident.
    pub async fn successor(&self) -> Option<PeerInfo> {
        self.topology.read().await.successors.first().cloned()
    }

    pub async fn successor_list(&self) -> Vec<PeerInfo> {
        self.topology.read().await.successors.clone()
    }

    pub async fn predecessor(&self) -> Option<PeerInfo> {
        self.topology.read().await.predecessor.clone()
    }

    pub async fn fingers(&self) -> Vec<PeerInfo> {
        self.topology.read().await.fingers.clone()
    }

    /// Overwrites the whole topology in one step. This bypasses the protocol
    /// and exists for statically wired rings in tests and for bootstrap
    /// tooling; live nodes converge through the membership operations instead.
    pub async fn install_topology(
        &self,
        successors: Vec<PeerInfo>,
        predecessor: Option<PeerInfo>,
        fingers: Vec<PeerInfo>,
    ) {
        let mut topo = self.topology.write().await;
        topo.successors = successors;
        topo.predecessor = predecessor;
        topo.fingers = fingers;
        topo.next_finger = 0;
        topo.probe = None;
    }

    /// Read-only snapshot of this node's ring edges for diagnostics.
    pub async fn dump(&self) -> NodeDump {
        let topo = self.topology.read().await;
        NodeDump {
            id: self.info.id,
            address: self.info.address.clone(),
            successors: topo.successors.iter().map(|p| p.id).collect(),
            predecessor: topo.predecessor.as_ref().map(|p| p.id),
            fingers: topo.fingers.iter().map(|p| p.id).collect(),
            predecessor_liveness: topo.probe.map(|r| r.status),
        }
    }
}
