use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rand::Rng;
use tracing::{info, warn};

use chordial::ring::types::{sha256_hasher, NodeId};
use chordial::ring::workers::{spawn_maintenance, MaintenanceConfig};
use chordial::storage::{MemoryStore, StorageService};
use chordial::{LocalRegistry, OverlayError, RingNode};

#[derive(Parser)]
#[command(name = "chordial")]
#[command(about = "A Chord-style overlay ring, simulated in one process")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a ring, converge it, route lookups and store a few keys
    Simulate {
        /// Ring size
        #[arg(short = 'n', long, default_value_t = 8)]
        nodes: usize,
        /// Maintenance rounds after each membership change
        #[arg(short = 'r', long, default_value_t = 4)]
        rounds: usize,
        /// Keys to store and read back through the responsible nodes
        #[arg(short = 'k', long, default_value_t = 5)]
        keys: usize,
        /// Crash one node after convergence and heal the ring
        #[arg(long)]
        fail_one: bool,
        /// Also run timer-driven maintenance for this long before exiting
        #[arg(long, default_value_t = 0)]
        live_millis: u64,
        /// Print the final ring dump as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), OverlayError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate {
            nodes,
            rounds,
            keys,
            fail_one,
            live_millis,
            json,
        } => simulate(nodes.max(1), rounds.max(1), keys, fail_one, live_millis, json).await,
    }
}

async fn simulate(
    node_count: usize,
    rounds: usize,
    key_count: usize,
    fail_one: bool,
    live_millis: u64,
    json: bool,
) -> Result<(), OverlayError> {
    let registry = Arc::new(LocalRegistry::new());

    // First node forms the ring; the rest join through it.
    let base = registry.register(RingNode::new("127.0.0.1:9000", 16, sha256_hasher()));
    base.create_new_ring().await;
    for i in 1..node_count {
        let address = format!("127.0.0.1:{}", 9000 + i);
        let node = registry.register(RingNode::new(address, 16, sha256_hasher()));
        node.join_ring(registry.as_ref(), base.info()).await?;
        registry.converge(rounds).await;
    }
    registry.converge(rounds).await;

    let dump = registry.dump().await;
    info!(
        nodes = dump.nodes.len(),
        converged = dump.is_converged(),
        "ring built"
    );

    // Drive the storage collaborators through the router: each key lands on
    // whichever node currently owns its identifier.
    let stores: HashMap<NodeId, MemoryStore> = registry
        .nodes()
        .iter()
        .map(|n| (n.id(), MemoryStore::new()))
        .collect();
    let mut rng = rand::rng();
    for _ in 0..key_count {
        let key = format!("key-{:06}", rng.random_range(0..1_000_000u32));
        let owner = base
            .locate_successor(registry.as_ref(), base.hash_key(&key))
            .await?;
        let store = &stores[&owner.id];
        store.put(&key, key.as_bytes().to_vec()).await?;
        let read_back = store.get(&key).await?;
        info!(%key, owner = %owner.id, found = read_back.is_some(), "key routed");
    }

    if fail_one && node_count > 1 {
        let victim = registry
            .nodes()
            .into_iter()
            .find(|n| n.id() != base.id())
            .map(|n| n.id());
        if let Some(victim) = victim {
            info!(node = %victim, "crashing one node");
            registry.mark_failed(victim);
            // Two extra rounds pay for the suspected-then-dead hysteresis.
            registry.converge(rounds + 2).await;
            let healed = registry.dump().await;
            info!(
                nodes = healed.nodes.len(),
                converged = healed.is_converged(),
                "ring healed"
            );
        }
    }

    if live_millis > 0 {
        let config = MaintenanceConfig::uniform(Duration::from_millis(50));
        let handles: Vec<_> = registry
            .live_nodes()
            .into_iter()
            .map(|node| {
                spawn_maintenance(
                    node,
                    registry.clone() as Arc<dyn chordial::ring::registry::Directory>,
                    config.clone(),
                )
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(live_millis)).await;
        for handle in handles {
            handle.stop().await;
        }
        info!("timer-driven maintenance finished");
    }

    let final_dump = registry.dump().await;
    if !final_dump.is_converged() {
        warn!("ring is not fully converged");
    }
    if json {
        match serde_json::to_string_pretty(&final_dump) {
            Ok(text) => println!("{text}"),
            Err(err) => warn!(%err, "could not serialize ring dump"),
        }
    }
    Ok(())
}
