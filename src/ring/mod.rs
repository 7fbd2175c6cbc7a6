pub mod diagnostics;
pub mod node;
pub mod oracle;
pub mod protocol;
pub mod registry;
pub mod routing;
pub mod types;
pub mod workers;

use std::time::Duration;

/// How many clockwise neighbors each node tracks beyond its immediate
/// successor. Bigger lists survive longer failure bursts.
pub const SUCCESSOR_LIST_SIZE: usize = 3;

/// Hard ceiling on the hop loop of a lookup. A healthy ring resolves in
/// O(log n) hops; hitting the ceiling means the topology references are stale
/// or cyclic.
pub const MAX_ROUTE_HOPS: u32 = 64;

/// Per-hop (and per-probe) deadline for a remote call. A timeout counts as a
/// liveness failure for healing purposes.
pub const RPC_TIMEOUT: Duration = Duration::from_millis(500);
