//! Timer-driven maintenance: the background schedule that keeps a node's
//! view of the ring converged while it serves lookups.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ring::node::RingNode;
use crate::ring::registry::Directory;

const STABILIZE_INTERVAL: Duration = Duration::from_secs(30);
const FIX_FINGERS_INTERVAL: Duration = Duration::from_secs(45);
const CHECK_PREDECESSOR_INTERVAL: Duration = Duration::from_secs(15);
const CHECK_SUCCESSORS_INTERVAL: Duration = Duration::from_secs(20);

/// Periods of the four maintenance operations. Each runs on its own timer;
/// they are idempotent and safe to interleave arbitrarily.
#[derive(Clone, Debug)]
pub struct MaintenanceConfig {
    pub stabilize: Duration,
    pub fix_fingers: Duration,
    pub check_predecessor: Duration,
    pub check_successors: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        MaintenanceConfig {
            stabilize: STABILIZE_INTERVAL,
            fix_fingers: FIX_FINGERS_INTERVAL,
            check_predecessor: CHECK_PREDECESSOR_INTERVAL,
            check_successors: CHECK_SUCCESSORS_INTERVAL,
        }
    }
}

impl MaintenanceConfig {
    /// One shared period for everything; handy for simulations that want
    /// fast convergence.
    pub fn uniform(period: Duration) -> Self {
        MaintenanceConfig {
            stabilize: period,
            fix_fingers: period,
            check_predecessor: period,
            check_successors: period,
        }
    }
}

/// Handle to a running maintenance task. Dropping it does not stop the task;
/// call [`MaintenanceHandle::stop`] for a cooperative shutdown.
pub struct MaintenanceHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MaintenanceHandle {
    /// Signals the loop to finish its current operation and exit. In-flight
    /// remote calls are abandoned at their own timeout, never interrupted;
    /// partially applied protocol exchanges are tolerated by design.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(%err, "maintenance task ended abnormally");
        }
    }
}

/// Spawns the periodic maintenance loop for one node.
pub fn spawn_maintenance(
    node: Arc<RingNode>,
    directory: Arc<dyn Directory>,
    config: MaintenanceConfig,
) -> MaintenanceHandle {
    let (shutdown, mut stopped) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut stabilize = tokio::time::interval(config.stabilize);
        let mut fix_fingers = tokio::time::interval(config.fix_fingers);
        let mut check_predecessor = tokio::time::interval(config.check_predecessor);
        let mut check_successors = tokio::time::interval(config.check_successors);
        info!(node = %node.id(), "maintenance started");
        loop {
            tokio::select! {
                _ = stopped.changed() => {
                    info!(node = %node.id(), "maintenance stopped");
                    return;
                }
                _ = stabilize.tick() => {
                    if let Err(err) = node.stabilize(directory.as_ref()).await {
                        debug!(node = %node.id(), %err, "stabilize skipped");
                    }
                }
                _ = fix_fingers.tick() => {
                    if let Err(err) = node.fix_fingers(directory.as_ref()).await {
                        debug!(node = %node.id(), %err, "finger refresh skipped");
                    }
                }
                _ = check_predecessor.tick() => {
                    node.check_predecessor(directory.as_ref()).await;
                }
                _ = check_successors.tick() => {
                    node.check_successors(directory.as_ref()).await;
                }
            }
        }
    });
    MaintenanceHandle { shutdown, task }
}
