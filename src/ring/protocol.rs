//! The membership protocol: ring formation, joining, and the periodic
//! operations that pull a drifting topology back to a single consistent
//! cycle.
//!
//! Every operation here is idempotent and safe to interleave with routing
//! reads and with its own repeated invocation. Rejected notifies, stale
//! stabilize comparisons and self-referencing finger results are ordinary
//! outcomes of eventual convergence, not faults.

use std::time::Instant;

use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::error::RingError;
use crate::ring::node::RingNode;
use crate::ring::oracle;
use crate::ring::registry::Directory;
use crate::ring::routing;
use crate::ring::types::{Liveness, PeerInfo, ProbeRecord};
use crate::ring::{RPC_TIMEOUT, SUCCESSOR_LIST_SIZE};

impl RingNode {
    /// Forms a brand-new single-node ring: successor is the node itself,
    /// predecessor unknown until somebody notifies.
    pub async fn create_new_ring(&self) {
        let mut topo = self.topology.write().await;
        topo.predecessor = None;
        topo.probe = None;
        topo.successors = vec![self.info().clone()];
        info!(node = %self.id(), "created new ring");
    }

    /// Becomes ring-resident through any existing member: the introducer
    /// locates this node's successor, then one immediate stabilize pass
    /// shortens convergence latency instead of waiting for the next tick.
    pub async fn join_ring(
        &self,
        directory: &dyn Directory,
        introducer: &PeerInfo,
    ) -> Result<(), RingError> {
        if !self.topology.read().await.successors.is_empty() {
            return Err(RingError::AlreadyJoined);
        }
        let successor = routing::locate_successor(directory, introducer, self.id()).await?;
        {
            let mut topo = self.topology.write().await;
            topo.predecessor = None;
            topo.probe = None;
            topo.successors = vec![successor.clone()];
        }
        info!(node = %self.id(), via = %introducer.id, successor = %successor.id, "joined ring");
        if let Err(err) = self.stabilize(directory).await {
            // Topology is already established; the next tick will retry.
            warn!(node = %self.id(), %err, "stabilize pass after join failed");
        }
        Ok(())
    }

    /// Verifies the successor edge and tells the successor about us.
    ///
    /// If the successor reports a predecessor lying strictly between this
    /// node and the successor, that peer is a closer successor and takes over
    /// the head of the list.
    pub async fn stabilize(&self, directory: &dyn Directory) -> Result<(), RingError> {
        let mut successor = self.successor().await.ok_or(RingError::EmptyNode)?;
        let reported = {
            let client = directory.connect(&successor).await?;
            timeout(RPC_TIMEOUT, client.predecessor())
                .await
                .map_err(|_| RingError::Timeout {
                    id: successor.id,
                    timeout: RPC_TIMEOUT,
                })??
        };
        if let Some(candidate) = reported {
            if candidate.id == self.id() {
                // The edge is already consistent.
                return Ok(());
            }
            if oracle::rotation_number(&[self.id(), candidate.id, successor.id]) == 1 {
                let mut topo = self.topology.write().await;
                topo.successors.insert(0, candidate.clone());
                dedupe_by_id(&mut topo.successors);
                topo.successors.truncate(SUCCESSOR_LIST_SIZE);
                debug!(node = %self.id(), adopted = %candidate.id, "tighter successor adopted");
                successor = candidate;
            }
        }
        let client = directory.connect(&successor).await?;
        timeout(RPC_TIMEOUT, client.notify(self.info().clone()))
            .await
            .map_err(|_| RingError::Timeout {
                id: successor.id,
                timeout: RPC_TIMEOUT,
            })??;
        Ok(())
    }

    /// Handles a peer claiming to be our predecessor. Accepted only if no
    /// predecessor is known or the claimant sits strictly between the current
    /// predecessor and this node; otherwise rejected silently. Returns
    /// whether the claim was accepted.
    pub async fn notify(&self, claimant: PeerInfo) -> bool {
        let mut topo = self.topology.write().await;
        let accept = match &topo.predecessor {
            None => true,
            Some(current) => {
                oracle::rotation_number(&[current.id, claimant.id, self.id()]) == 1
            }
        };
        if accept {
            let replaced = topo.predecessor.as_ref().map(|p| p.id) != Some(claimant.id);
            debug!(node = %self.id(), predecessor = %claimant.id, "predecessor adopted");
            topo.predecessor = Some(claimant);
            if replaced {
                topo.probe = Some(ProbeRecord::fresh());
            }
        } else {
            trace!(node = %self.id(), claimant = %claimant.id, "notify rejected");
        }
        accept
    }

    /// Refreshes one finger-table entry: advances the rotating cursor and
    /// locates the successor of `id + 2^cursor`. A result pointing back at
    /// this node leaves the table untouched for this tick.
    pub async fn fix_fingers(&self, directory: &dyn Directory) -> Result<(), RingError> {
        let cursor = {
            let mut topo = self.topology.write().await;
            topo.next_finger += 1;
            if topo.next_finger > self.last_index() {
                topo.next_finger = 0;
            }
            topo.next_finger
        };
        let target = self.id().finger_target(cursor);
        let found = self.locate_successor(directory, target).await?;
        if found.id == self.id() {
            return Ok(());
        }
        let mut topo = self.topology.write().await;
        if topo.fingers.len() <= self.last_index() as usize {
            topo.fingers.push(found);
        } else {
            topo.fingers[cursor as usize] = found;
        }
        Ok(())
    }

    /// Probes the predecessor's liveness. One failed probe marks it
    /// suspected; a second consecutive failure declares it dead and clears
    /// the reference so future notifies can repopulate it. Never fails the
    /// caller.
    pub async fn check_predecessor(&self, directory: &dyn Directory) {
        let Some(predecessor) = self.predecessor().await else {
            return;
        };
        let outcome = probe(directory, &predecessor).await;
        let mut topo = self.topology.write().await;
        // The predecessor may have been replaced while the probe was in
        // flight; the verdict then belongs to nobody.
        if topo.predecessor.as_ref().map(|p| p.id) != Some(predecessor.id) {
            return;
        }
        match outcome {
            Ok(()) => {
                topo.probe = Some(ProbeRecord {
                    status: Liveness::Alive,
                    last_probe: Some(Instant::now()),
                });
            }
            Err(err) => {
                match &err {
                    RingError::Timeout { .. } => {
                        warn!(node = %self.id(), predecessor = %predecessor.id, %err,
                              "predecessor probe timed out")
                    }
                    _ => warn!(node = %self.id(), predecessor = %predecessor.id, %err,
                               "predecessor unreachable"),
                }
                let prior = topo.probe.map(|r| r.status).unwrap_or(Liveness::Alive);
                if prior == Liveness::Alive {
                    topo.probe = Some(ProbeRecord {
                        status: Liveness::Suspected,
                        last_probe: Some(Instant::now()),
                    });
                } else {
                    debug!(node = %self.id(), predecessor = %predecessor.id,
                           "predecessor declared dead, clearing");
                    topo.predecessor = None;
                    topo.probe = None;
                }
            }
        }
    }

    /// Heals the successor list: drops dead entries ahead of the first live
    /// one, promotes that entry to immediate successor and refills the list
    /// from the promoted peer's own successors. With every entry dead the
    /// stale list is kept; a node must always have some successor to fall
    /// back to. Never fails the caller.
    pub async fn check_successors(&self, directory: &dyn Directory) {
        let snapshot = self.successor_list().await;
        if snapshot.is_empty() {
            return;
        }
        let mut head = None;
        for peer in &snapshot {
            match probe(directory, peer).await {
                Ok(()) => {
                    head = Some(peer.clone());
                    break;
                }
                Err(err) => {
                    warn!(node = %self.id(), successor = %peer.id, %err,
                          "dropping dead successor");
                }
            }
        }
        let Some(head) = head else {
            error!(node = %self.id(), "every successor failed its probe; keeping stale list");
            return;
        };
        let mut refill = vec![head.clone()];
        match directory.connect(&head).await {
            Ok(client) => match timeout(RPC_TIMEOUT, client.successor_list()).await {
                Ok(Ok(list)) => {
                    for peer in list {
                        if refill.len() >= SUCCESSOR_LIST_SIZE {
                            break;
                        }
                        if peer.id == self.id() || refill.iter().any(|p| p.id == peer.id) {
                            continue;
                        }
                        refill.push(peer);
                    }
                }
                Ok(Err(err)) => {
                    debug!(node = %self.id(), successor = %head.id, %err, "refill skipped")
                }
                Err(_) => {
                    debug!(node = %self.id(), successor = %head.id, "refill timed out")
                }
            },
            Err(err) => debug!(node = %self.id(), successor = %head.id, %err, "refill skipped"),
        }
        let mut topo = self.topology.write().await;
        topo.successors = refill;
    }
}

/// Liveness probe under the deployment's per-call deadline. A timeout counts
/// as failure here, distinguished only in the caller's logs.
async fn probe(directory: &dyn Directory, peer: &PeerInfo) -> Result<(), RingError> {
    let client = directory.connect(peer).await?;
    timeout(RPC_TIMEOUT, client.ping())
        .await
        .map_err(|_| RingError::Timeout {
            id: peer.id,
            timeout: RPC_TIMEOUT,
        })?
}

fn dedupe_by_id(peers: &mut Vec<PeerInfo>) {
    let mut seen = Vec::with_capacity(peers.len());
    peers.retain(|peer| {
        if seen.contains(&peer.id) {
            false
        } else {
            seen.push(peer.id);
            true
        }
    });
}
