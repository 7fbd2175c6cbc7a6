use std::time::Duration;

use thiserror::Error;

use crate::ring::types::NodeId;

/// Top-level error for callers that mix ring and storage operations.
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("ring protocol error: {0}")]
    Ring(#[from] RingError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors surfaced by routing and membership operations.
///
/// The taxonomy keeps "give up, ring too small" (`EmptyNode`, `NoRoute`,
/// `HopsExhausted`) apart from "peer currently unreachable, retry later"
/// (`Unreachable`, `Timeout`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RingError {
    #[error("node has no successors yet")]
    EmptyNode,

    #[error("node is already resident in a ring")]
    AlreadyJoined,

    #[error("no route to identifier {0}")]
    NoRoute(NodeId),

    #[error("hop budget exhausted after {hops} hops while routing to {target}")]
    HopsExhausted { target: NodeId, hops: u32 },

    #[error("peer {id} at {address} is unreachable")]
    Unreachable { id: NodeId, address: String },

    #[error("peer {id} did not answer within {timeout:?}")]
    Timeout { id: NodeId, timeout: Duration },
}

impl RingError {
    /// True for liveness failures, where retrying against another peer can
    /// succeed; false for topology exhaustion, where it cannot.
    pub fn is_liveness_failure(&self) -> bool {
        matches!(
            self,
            RingError::Unreachable { .. } | RingError::Timeout { .. }
        )
    }
}

/// Errors from the external storage collaborator.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}
