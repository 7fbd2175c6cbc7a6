use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A position in the circular 64-bit identifier space. Arithmetic wraps past
/// the maximum value back to zero.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    pub fn new(raw: u64) -> Self {
        NodeId(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    /// Identifier at clockwise distance `2^k` from this one, the aim point of
    /// finger-table entry `k`.
    pub fn finger_target(self, k: u32) -> NodeId {
        NodeId(self.0.wrapping_add(1u64.wrapping_shl(k)))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:016x})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Logical reference to a peer: its ring position plus the opaque
/// transport-level endpoint it can be reached at. This is what topology
/// state stores instead of live handles to other nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: NodeId,
    pub address: String,
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

/// Pluggable mapping from an arbitrary string key to a ring identifier.
pub type KeyHasher = Arc<dyn Fn(&str) -> NodeId + Send + Sync>;

/// Maps a key to its length. Adequate only for controlled tests where ring
/// positions must be chosen by hand, never for production uniformity.
pub fn length_hasher() -> KeyHasher {
    Arc::new(|key| NodeId::new(key.len() as u64))
}

/// SHA-256 truncated to the identifier width. The uniform choice for real
/// deployments.
pub fn sha256_hasher() -> KeyHasher {
    Arc::new(|key| {
        let digest = Sha256::digest(key.as_bytes());
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        NodeId::new(u64::from_be_bytes(word))
    })
}

/// Tri-state liveness verdict for a probed peer. `Suspected` buys one probe
/// period of hysteresis before a peer is declared dead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Liveness {
    Alive,
    Suspected,
    Dead,
}

/// Outcome of the most recent liveness probe of the predecessor.
#[derive(Clone, Copy, Debug)]
pub struct ProbeRecord {
    pub status: Liveness,
    pub last_probe: Option<Instant>,
}

impl ProbeRecord {
    pub fn fresh() -> Self {
        ProbeRecord {
            status: Liveness::Alive,
            last_probe: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finger_targets_wrap() {
        assert_eq!(NodeId::new(0).finger_target(3), NodeId::new(8));
        assert_eq!(NodeId::new(u64::MAX).finger_target(0), NodeId::new(0));
        assert_eq!(
            NodeId::new(1 << 63).finger_target(63),
            NodeId::new(0),
        );
    }

    #[test]
    fn length_hasher_is_the_test_placeholder() {
        let hash = length_hasher();
        assert_eq!(hash(""), NodeId::new(0));
        assert_eq!(hash("abcd"), NodeId::new(4));
    }

    #[test]
    fn sha256_hasher_is_stable_and_spread() {
        let hash = sha256_hasher();
        assert_eq!(hash("node-1"), hash("node-1"));
        assert_ne!(hash("node-1"), hash("node-2"));
    }
}
