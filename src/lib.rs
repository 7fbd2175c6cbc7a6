//! Membership, routing and self-stabilization for a Chord-style overlay ring.
//!
//! Peers occupy points on a circular 64-bit identifier space. Each node keeps
//! a successor list, a predecessor and a finger table, answers "which peer is
//! responsible for identifier X" in a logarithmic number of hops, and repairs
//! its own view of the ring through periodic stabilization. There is no
//! central coordinator; consistency is eventual and survives churn.
//!
//! The wire transport is deliberately external: every cross-node access goes
//! through the [`ring::registry::Directory`] seam, and the bundled
//! [`ring::registry::LocalRegistry`] resolves peers in-process for simulation
//! and testing.

pub mod error;
pub mod ring;
pub mod storage;

pub use error::{OverlayError, RingError, StorageError};
pub use ring::node::RingNode;
pub use ring::registry::LocalRegistry;
pub use ring::types::{NodeId, PeerInfo};
